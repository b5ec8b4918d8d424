use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

/// How a category icon tag is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconSpec {
    pub tag: &'static str,
    pub glyph: &'static str,
    pub label: &'static str,
}

pub const FALLBACK_ICON: IconSpec = IconSpec {
    tag: "tag",
    glyph: "🏷",
    label: "Category",
};

const ICONS: &[IconSpec] = &[
    IconSpec {
        tag: "utensils",
        glyph: "🍽",
        label: "Food",
    },
    IconSpec {
        tag: "shopping-cart",
        glyph: "🛒",
        label: "Shopping",
    },
    IconSpec {
        tag: "home",
        glyph: "🏠",
        label: "Home",
    },
    IconSpec {
        tag: "zap",
        glyph: "⚡",
        label: "Utilities",
    },
    IconSpec {
        tag: "car",
        glyph: "🚗",
        label: "Transport",
    },
    IconSpec {
        tag: "heart",
        glyph: "❤",
        label: "Health",
    },
    IconSpec {
        tag: "book",
        glyph: "📚",
        label: "Education",
    },
    IconSpec {
        tag: "film",
        glyph: "🎬",
        label: "Entertainment",
    },
    IconSpec {
        tag: "gift",
        glyph: "🎁",
        label: "Gifts",
    },
    IconSpec {
        tag: "plane",
        glyph: "✈",
        label: "Travel",
    },
    IconSpec {
        tag: "paw",
        glyph: "🐾",
        label: "Pets",
    },
    FALLBACK_ICON,
];

static REGISTRY: Lazy<HashMap<&'static str, IconSpec>> =
    Lazy::new(|| ICONS.iter().map(|spec| (spec.tag, *spec)).collect());

/// Looks up an icon tag; unknown or empty tags get [`FALLBACK_ICON`].
pub fn icon_for(tag: &str) -> IconSpec {
    REGISTRY
        .get(tag.trim().to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(FALLBACK_ICON)
}
