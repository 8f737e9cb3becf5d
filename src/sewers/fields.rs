//! Attribute codes of the sewer survey export.

pub const ID: &str = "id";
pub const Z: &str = "Z";
pub const LAYER: &str = "Layer";
pub const COLOR: &str = "Color";

/// Height of the shaft cover.
pub const SHAFT_COVER_HEIGHT: &str = "E0101.N01_%";
/// Height of the shaft bottom (the deepest point).
pub const SHAFT_BOTTOM_HEIGHT: &str = "E0101.N02_%";
/// Measured pipe length.
pub const PIPE_LENGTH: &str = "E0102.N03_%";
/// Profile width of a pipe in millimeters.
pub const PIPE_WIDTH: &str = "E0102.N05_%";

/// How a label value is copied onto a shaft or pipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CopyMode {
    Verbatim,
    Numeric,
}

/// Label attributes that belong to a shaft.
pub const SHAFT_LABEL_FIELDS: &[(&str, CopyMode)] = &[
    ("Color", CopyMode::Verbatim),
    ("Linetype", CopyMode::Verbatim),
    ("Lineweight", CopyMode::Verbatim),
    ("Hyperlink", CopyMode::Verbatim),
    ("Thickness", CopyMode::Verbatim),
    (SHAFT_COVER_HEIGHT, CopyMode::Numeric),
    (SHAFT_BOTTOM_HEIGHT, CopyMode::Numeric),
    ("E0101.C01_%", CopyMode::Verbatim),
    ("E0102.C05_%", CopyMode::Verbatim),
    ("C37_%S", CopyMode::Verbatim),
    ("Elevation", CopyMode::Verbatim),
];

/// Label attributes that belong to a pipe.
pub const PIPE_LABEL_FIELDS: &[(&str, CopyMode)] = &[
    ("Color", CopyMode::Verbatim),
    ("Linetype", CopyMode::Verbatim),
    ("Lineweight", CopyMode::Verbatim),
    ("Hyperlink", CopyMode::Verbatim),
    ("Thickness", CopyMode::Verbatim),
    ("E0102.N01_%", CopyMode::Numeric),
    ("E0102.N02_%", CopyMode::Numeric),
    (PIPE_LENGTH, CopyMode::Numeric),
    (PIPE_WIDTH, CopyMode::Numeric),
    ("E0102.N06_%", CopyMode::Verbatim),
    ("E0102.N08_%", CopyMode::Numeric),
    ("E0101.C01_%", CopyMode::Verbatim),
    ("E0102.C05_%", CopyMode::Verbatim),
    ("C37_%S", CopyMode::Verbatim),
    ("Elevation", CopyMode::Verbatim),
];

/// Output names of the attribute codes. Keys missing here keep their name.
pub const OUTPUT_NAMES: &[(&str, &str)] = &[
    ("Color", "Farbe"),
    ("Linetype", "Linen-Typ"),
    ("Lineweight", "Linienstärke"),
    ("Thickness", "Dicke"),
    ("BlkName", "Blockname"),
    ("E0101.C01_%", "Schachtnummer"),
    (SHAFT_COVER_HEIGHT, "Deckelhöhe [m]"),
    (SHAFT_BOTTOM_HEIGHT, "Sohlhöhe [m]"),
    (PIPE_LENGTH, "Länge Aufmaß [m]"),
    ("E0102.C05_%", "Materialkürzel"),
    (PIPE_WIDTH, "Profilbreite [mm]"),
    ("E0102.N08_%", "Neigung [‰]"),
    ("E0102.N01_%", "Ablaufhöhe [m]"),
    ("E0102.N02_%", "Anlaufhöhe [m]"),
    ("E0102.N06_%", "Profilhöhe [mm]"),
    ("C37_%S", "Kommentar"),
];
