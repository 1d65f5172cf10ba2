use crate::mods::{self, Mod};
use colored::Colorize;
use std::path::Path;

pub const DEFAULT_SEPARATOR: &str = ";";

/// OSC 8 terminal hyperlink.
pub fn hyperlink(url: &str, text: &str) -> String {
    format!("\x1b]8;;{url}\x1b\\{text}\x1b]8;;\x1b\\")
}

/// Human readable line for one mod. Disabled mods are struck through and
/// tagged so they stay distinguishable when colors are off.
pub fn display_line(value: &Mod) -> String {
    let label = hyperlink(&value.url(), &value.text());
    if value.enabled() {
        label
    } else {
        format!("{} {}", label.strikethrough(), "(disabled)".italic())
    }
}

pub fn display_lines<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Mod>,
{
    values.into_iter().map(display_line).collect()
}

/// Install paths of the enabled mods, in load order, joined by `sep`.
pub fn mods_str<'a, I>(values: I, base_dir: &Path, sep: &str) -> String
where
    I: IntoIterator<Item = &'a Mod>,
{
    values
        .into_iter()
        .filter(|value| value.enabled())
        .map(|value| mods::resolve(value, base_dir).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `-mod=` argument for the server binary, or an empty string when nothing
/// is enabled.
pub fn launch_mod_arg<'a, I>(values: I, base_dir: &Path) -> String
where
    I: IntoIterator<Item = &'a Mod>,
{
    let joined = mods_str(values, base_dir, DEFAULT_SEPARATOR);
    if joined.is_empty() {
        return String::new();
    }
    format!("-mod={joined}")
}
