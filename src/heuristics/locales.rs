//! Built-in quoted-reply header patterns, grouped by locale
//!
//! Each entry is `(name, pattern)`. Patterns are compiled in multi-line mode, so
//! `^` and `$` anchor to individual lines of the classified text.
//! Adding a locale means adding a pack here; the matcher itself never changes.

/// A named group of text-pattern heuristics for one locale
#[derive(Debug)]
pub struct LocalePack {
    pub locale: &'static str,
    pub patterns: &'static [(&'static str, &'static str)],
}

pub const ENGLISH: LocalePack = LocalePack {
    locale: "en",
    patterns: &[
        // On Mon, Jan 1, 2024 at 10:00 AM, someone@example.com wrote:
        ("on-wrote", r"^On .+ wrote:$"),
        // On Mon, Jan 1, 2024, Someone <someone@example.com> wrote:
        ("on-wrote-address", r"^On .+, .+ <.+> wrote:$"),
        ("from-header", r"^From: .+$"),
        ("sent-header", r"^Sent: .+$"),
        ("to-header", r"^To: .+$"),
        ("subject-header", r"^Subject: .+$"),
        ("date-header", r"^Date: .+$"),
        // 2024-01-01 10:00 GMT+01:00 someone:
        ("iso-date-gmt", r"^\d{4}-\d{2}-\d{2} .+ GMT.+:$"),
    ],
};

pub const FRENCH: LocalePack = LocalePack {
    locale: "fr",
    patterns: &[("le-a-ecrit", r"^Le .+ a écrit :$")],
};

pub const GERMAN: LocalePack = LocalePack {
    locale: "de",
    patterns: &[("am-schrieb", r"^Am .+ schrieb .+:$")],
};

pub const SPANISH: LocalePack = LocalePack {
    locale: "es",
    patterns: &[("el-escribio", r"^El .+ escribió:$")],
};

pub const BUILTIN: &[&LocalePack] = &[&ENGLISH, &FRENCH, &GERMAN, &SPANISH];

/// Locales enabled when the config does not say otherwise
pub const DEFAULT_LOCALES: &[&str] = &["en", "fr"];

pub fn find(locale: &str) -> Option<&'static LocalePack> {
    BUILTIN
        .iter()
        .copied()
        .find(|pack| pack.locale.eq_ignore_ascii_case(locale))
}
