//! Style roles for terminal output
//!
//! Each logical role maps to one `colored::Color`. Colouring only happens
//! when the caller passes `enabled`, so nothing depends on global state.

use colored::{Color, Colorize};

macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }
        }
    }
}

style! {
    Header  => Some(Color::Yellow),
    Name    => Some(Color::BrightGreen),
    Running => Some(Color::Green),
    Faulted => Some(Color::BrightRed),
    Value   => None,
    Dim     => Some(Color::BrightBlack),
}

impl StyleRole {
    pub fn paint(self, text: &str, enabled: bool) -> String {
        match self.color().filter(|_| enabled) {
            Some(color) => text.color(color).to_string(),
            None => text.to_string(),
        }
    }

    /// Foreground spec for prettytable cells (`Fy`, `FG`, ...)
    pub fn to_prettytable_spec(self) -> Option<&'static str> {
        let spec = match self.color()? {
            Color::Red => "Fr",
            Color::Green => "Fg",
            Color::Yellow => "Fy",
            Color::Blue => "Fb",
            Color::BrightBlack => "FK",
            Color::BrightRed => "FR",
            Color::BrightGreen => "FG",
            _ => return None,
        };
        Some(spec)
    }
}
