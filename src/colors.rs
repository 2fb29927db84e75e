use nu_ansi_term::{Color, Style};

use crate::color_cane::ColorCane;

/// Color group of an output piece, combining change states and lexical
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorGroup {
    #[default]
    None,

    Deleted,
    Inserted,
    Updated,
    Moved,

    // parts of updated diffables
    PieceDeleted,
    PieceInserted,
    PieceUpdated,
    UpdatedSurroundings,

    Specifiers,
    UserTypes,
    Types,
    Directives,
    Comments,
    Constants,
    Functions,
    Keywords,
    Brackets,
    Operators,

    Other,
}

/// Maps color groups to terminal styles.
#[derive(Debug, Clone, Default)]
pub struct ColorScheme;

impl ColorScheme {
    pub fn style_of(&self, group: ColorGroup) -> Style {
        match group {
            ColorGroup::None | ColorGroup::Other => Style::new(),

            ColorGroup::Deleted => Color::Red.bold(),
            ColorGroup::Inserted => Color::Green.bold(),
            ColorGroup::Updated => Color::Yellow.bold(),
            ColorGroup::Moved => Color::Blue.bold(),

            ColorGroup::PieceDeleted => Style::new().on(Color::Red),
            ColorGroup::PieceInserted => Style::new().on(Color::Green),
            ColorGroup::PieceUpdated => Style::new().on(Color::Yellow),
            ColorGroup::UpdatedSurroundings => Color::DarkGray.normal(),

            ColorGroup::Specifiers => Color::Purple.normal(),
            ColorGroup::UserTypes | ColorGroup::Types => Color::Cyan.normal(),
            ColorGroup::Directives => Color::LightPurple.normal(),
            ColorGroup::Comments => Color::DarkGray.italic(),
            ColorGroup::Constants => Color::LightRed.normal(),
            ColorGroup::Functions => Color::LightBlue.normal(),
            ColorGroup::Keywords => Color::Magenta.bold(),
            ColorGroup::Brackets => Color::LightGray.normal(),
            ColorGroup::Operators => Color::LightYellow.normal(),
        }
    }

    /// Renders a cane as an escape-coded string.
    pub fn render(&self, cane: &ColorCane<'_>) -> String {
        let mut out = String::new();
        for piece in cane {
            let style = self.style_of(piece.hi);
            out.push_str(&style.paint(piece.text.as_str()).to_string());
        }
        out
    }
}
