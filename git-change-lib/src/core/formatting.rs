//! Formatting and output helpers.
//!
//! We try to handle both textual output and interactive output (output to a
//! "TTY"). In the case of interactive output, we render with prettier non-ASCII
//! characters and with colors, using shell-specific escape codes.

use std::fmt::Display;

use console::Style;

/// Pluralize a quantity, as appropriate. Example:
///
/// ```
/// # use gitchange::core::formatting::Pluralize;
/// let p = Pluralize {
///     determiner: None,
///     amount: 1,
///     unit: ("branch", "branches"),
/// };
/// assert_eq!(p.to_string(), "1 branch");
///
/// let p = Pluralize {
///     determiner: Some(("this", "these")),
///     amount: 2,
///     unit: ("branch", "branches"),
/// };
/// assert_eq!(p.to_string(), "these 2 branches");
/// ```
pub struct Pluralize<'a> {
    /// The string to render before the amount if the amount is singular vs plural.
    pub determiner: Option<(&'a str, &'a str)>,

    /// The amount of the quantity.
    pub amount: usize,

    /// The string to render after the amount if the amount is singular vs plural.
    pub unit: (&'a str, &'a str),
}

impl Display for Pluralize<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self {
                determiner: None,
                amount,
                unit: (unit, _),
            } if *amount == 1 => write!(f, "{amount} {unit}"),

            Self {
                determiner: None,
                amount,
                unit: (_, unit),
            } => write!(f, "{amount} {unit}"),

            Self {
                determiner: Some((determiner, _)),
                amount,
                unit: (unit, _),
            } if *amount == 1 => write!(f, "{determiner} {amount} {unit}"),

            Self {
                determiner: Some((_, determiner)),
                amount,
                unit: (_, unit),
            } => write!(f, "{determiner} {amount} {unit}"),
        }
    }
}

/// Glyphs to use when rendering output.
#[derive(Clone, Debug)]
pub struct Glyphs {
    /// Whether or not ANSI escape codes should be emitted (e.g. to render
    /// color).
    pub should_write_ansi_escape_codes: bool,
}

impl Glyphs {
    /// Make the `Glyphs` object appropriate for `stdout`.
    pub fn detect() -> Self {
        if console::user_attended() {
            Glyphs::pretty()
        } else {
            Glyphs::text()
        }
    }

    /// Glyphs used for output to a text file or non-TTY.
    pub fn text() -> Self {
        Glyphs {
            should_write_ansi_escape_codes: false,
        }
    }

    /// Glyphs used for output to a TTY.
    pub fn pretty() -> Self {
        Glyphs {
            should_write_ansi_escape_codes: true,
        }
    }

    /// Render `text` with the given style, if this set of glyphs is allowed to
    /// emit escape codes. Otherwise, return the text unchanged.
    pub fn render(&self, style: &Style, text: impl Display) -> String {
        if self.should_write_ansi_escape_codes {
            style.apply_to(text).force_styling(true).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Styles for the different kinds of objects mentioned in output.
pub mod styles {
    use console::Style;
    use lazy_static::lazy_static;

    lazy_static! {
        /// Branch names.
        pub static ref BRANCH: Style = Style::new().green().bold();

        /// Anything that went wrong or was left behind.
        pub static ref ERROR: Style = Style::new().red().bold();

        /// Warnings which need the user's attention but are not fatal.
        pub static ref WARNING: Style = Style::new().yellow().bold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_without_determiner() {
        let plural = Pluralize {
            determiner: None,
            amount: 0,
            unit: ("branch", "branches"),
        };
        assert_eq!(plural.to_string(), "0 branches");
    }

    #[test]
    fn test_text_glyphs_do_not_style() {
        let glyphs = Glyphs::text();
        assert_eq!(glyphs.render(&styles::BRANCH, "change-I1"), "change-I1");
    }

    #[test]
    fn test_pretty_glyphs_style() {
        let glyphs = Glyphs::pretty();
        let rendered = glyphs.render(&styles::BRANCH, "change-I1");
        assert!(rendered.contains("change-I1"));
        assert_ne!(rendered, "change-I1");
    }
}
