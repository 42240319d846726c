//! Vehicle segment taxonomy

use std::fmt;

/// Market segment assigned to a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Buggy,
    CaminhaoLeve,
    Conversivel,
    Coupe,
    Hatch,
    Perua,
    PickUp,
    Seda,
    Suv,
    VanUtilitario,
}

impl Segment {
    /// Every segment, in the order they are listed to the classifier
    pub const ALL: [Segment; 10] = [
        Segment::Buggy,
        Segment::CaminhaoLeve,
        Segment::Conversivel,
        Segment::Coupe,
        Segment::Hatch,
        Segment::Perua,
        Segment::PickUp,
        Segment::Seda,
        Segment::Suv,
        Segment::VanUtilitario,
    ];

    /// Label stored in the database and used in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buggy => "Buggy",
            Self::CaminhaoLeve => "Caminhão Leve",
            Self::Conversivel => "Conversível",
            Self::Coupe => "Coupé",
            Self::Hatch => "Hatch",
            Self::Perua => "Perua",
            Self::PickUp => "Pick-up",
            Self::Seda => "Sedã",
            Self::Suv => "SUV",
            Self::VanUtilitario => "Van/Utilitário",
        }
    }

    /// Exact label lookup, as stored in the database
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }

    /// Lenient lookup for free-text answers
    ///
    /// Ignores case and surrounding whitespace and strips a leading list
    /// number such as `"3. "`.
    pub fn parse(answer: &str) -> Option<Self> {
        let text = strip_list_number(answer.trim());
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().to_lowercase() == lowered)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn strip_list_number(text: &str) -> &str {
    let digits = text.len() - text.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return text;
    }
    match text[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}
