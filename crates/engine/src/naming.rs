//! Default entity names and collision suffixing.

use std::collections::HashSet;

use crate::models::EntityKind;

pub const DEFAULT_AGENT_NAME: &str = "New agent";
pub const DEFAULT_TOOL_NAME: &str = "new_tool";
pub const DEFAULT_PROMPT_NAME: &str = "New prompt";

/// Name given to a freshly added entity that did not ask for one.
pub fn default_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Agent => DEFAULT_AGENT_NAME,
        EntityKind::Tool => DEFAULT_TOOL_NAME,
        EntityKind::Prompt => DEFAULT_PROMPT_NAME,
    }
}

/// Tool names are identifiers, so their suffix is joined with `_`.
fn separator(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Tool => "_",
        EntityKind::Agent | EntityKind::Prompt => " ",
    }
}

/// `base` if it is free, otherwise `base` plus a numeric suffix.
///
/// The first suffix tried is one more than the number of taken names that
/// start with `base` ("New agent" taken → "New agent 2"); it is bumped until
/// the candidate is free.
pub fn unique_name<'a, I>(kind: EntityKind, base: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    let sep = separator(kind);
    let mut n = taken.iter().filter(|name| name.starts_with(base)).count() + 1;
    loop {
        let candidate = format!("{base}{sep}{n}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_is_kept() {
        assert_eq!(unique_name(EntityKind::Agent, "Triage", ["Billing"]), "Triage");
    }

    #[test]
    fn collisions_get_kind_specific_suffix() {
        assert_eq!(unique_name(EntityKind::Agent, "New agent", ["New agent"]), "New agent 2");
        assert_eq!(unique_name(EntityKind::Tool, "new_tool", ["new_tool"]), "new_tool_2");
        assert_eq!(
            unique_name(EntityKind::Prompt, "New prompt", ["New prompt", "New prompt 2"]),
            "New prompt 3"
        );
    }

    #[test]
    fn suffix_is_bumped_past_taken_candidates() {
        // Two names start with the base, so "new_tool_3" is tried first and is taken.
        let taken = ["new_tool", "new_tool_3"];
        assert_eq!(unique_name(EntityKind::Tool, "new_tool", taken), "new_tool_4");
    }
}
