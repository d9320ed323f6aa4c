use crate::dto::payload::Payload;

/// Inline keyboard attached to a message, laid out as rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// Callback button carrying a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: Payload,
    pub color: ButtonColor,
}

/// Visual hint for a button; platforms without colors ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonColor {
    #[default]
    Primary,
    Secondary,
    Positive,
    Negative,
}

impl ButtonColor {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonColor::Primary => "primary",
            ButtonColor::Secondary => "secondary",
            ButtonColor::Positive => "positive",
            ButtonColor::Negative => "negative",
        }
    }
}

impl Button {
    pub fn new(label: impl Into<String>, payload: Payload) -> Self {
        Self {
            label: label.into(),
            payload,
            color: ButtonColor::default(),
        }
    }

    pub fn colored(mut self, color: ButtonColor) -> Self {
        self.color = color;
        self
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row holding the given buttons; empty rows are skipped.
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Iterate over every button in reading order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
