//! Friend list handling
//!
//! A friend list is the comma separated value of the `OpenIDE-Module-Friends`
//! manifest attribute, e.g. `org.foo.bar, org.foo.baz`. Only the modules named
//! there may depend on the declaring module's friend-only packages.

/// Default attribute holding the friend list
pub const FRIENDS_ATTRIBUTE: &str = "OpenIDE-Module-Friends";

/// Default identifier added to friend lists
pub const DEFAULT_TARGET: &str = "com.viettel.vep.tools";

/// Result of merging a target into a friend list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendMerge {
    /// The target is already a friend, the list stays as it is
    Unchanged,
    /// The new list value
    Updated(String),
}

/// Split a friend list into its trimmed, non-empty identifiers
pub fn friends(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|friend| !friend.is_empty())
        .collect()
}

/// Check whether `target` appears as a whole identifier in `list`
///
/// `com.acme.tools` is not a friend of a list that only names
/// `com.acme.tools.extra`.
pub fn contains_friend(list: &str, target: &str) -> bool {
    friends(list).iter().any(|friend| *friend == target)
}

/// Add `target` to a friend list
///
/// - Empty or missing list: the result is just `target`
/// - `target` already present: [`FriendMerge::Unchanged`]
/// - List ending with a comma (after trailing whitespace): `" " + target` is appended
/// - Otherwise `", " + target` is appended
pub fn merge_friend(current: Option<&str>, target: &str) -> FriendMerge {
    let current = match current {
        Some(value) if !value.is_empty() => value,
        _ => return FriendMerge::Updated(target.to_string()),
    };

    if contains_friend(current, target) {
        return FriendMerge::Unchanged;
    }

    let trimmed = current.trim_end();
    let separator = if trimmed.ends_with(',') { " " } else { ", " };
    FriendMerge::Updated(format!("{}{}{}", trimmed, separator, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = DEFAULT_TARGET;

    fn updated(value: &str) -> FriendMerge {
        FriendMerge::Updated(value.to_string())
    }

    #[test]
    fn test_merge_into_empty_list() {
        assert_eq!(merge_friend(None, TARGET), updated(TARGET));
        assert_eq!(merge_friend(Some(""), TARGET), updated(TARGET));
    }

    #[test]
    fn test_merge_appends_with_separator() {
        assert_eq!(
            merge_friend(Some("foo.bar"), TARGET),
            updated("foo.bar, com.viettel.vep.tools")
        );
        assert_eq!(
            merge_friend(Some("foo.bar,"), TARGET),
            updated("foo.bar, com.viettel.vep.tools")
        );
        assert_eq!(
            merge_friend(Some("foo.bar, baz.qux  "), TARGET),
            updated("foo.bar, baz.qux, com.viettel.vep.tools")
        );
        assert_eq!(
            merge_friend(Some("foo.bar ,  "), TARGET),
            updated("foo.bar , com.viettel.vep.tools")
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        assert_eq!(
            merge_friend(Some("foo.bar, com.viettel.vep.tools"), TARGET),
            FriendMerge::Unchanged
        );
        assert_eq!(merge_friend(Some("com.viettel.vep.tools"), TARGET), FriendMerge::Unchanged);

        let FriendMerge::Updated(once) = merge_friend(Some("foo.bar"), TARGET) else {
            panic!("expected an update");
        };
        assert_eq!(merge_friend(Some(&once), TARGET), FriendMerge::Unchanged);
    }

    #[test]
    fn test_merge_matches_whole_identifiers() {
        assert_eq!(
            merge_friend(Some("com.viettel.vep.tools.extra"), TARGET),
            updated("com.viettel.vep.tools.extra, com.viettel.vep.tools")
        );
        assert!(!contains_friend("xcom.viettel.vep.tools", TARGET));
        assert!(contains_friend("a.b,com.viettel.vep.tools,c.d", TARGET));
    }

    #[test]
    fn test_friends_split() {
        assert_eq!(friends("a.b, c.d ,, e.f"), vec!["a.b", "c.d", "e.f"]);
        assert!(friends(" , ").is_empty());
    }
}
