//! The read-only allow-list `graph_query` and the reference graph adapter
//! both apply (spec.md §4.3: "the engine MUST validate the query is
//! side-effect free"). A real Cypher/Gremlin parser is out of scope; this
//! is a conservative keyword prefix/substring filter, same spirit as the
//! teacher's `dedup` tool rejecting out-of-range thresholds before doing
//! any work.

const WRITE_KEYWORDS: &[&str] = &[
    "create", "merge", "set", "delete", "detach", "remove", "drop", "call apoc", "load csv",
];

/// Returns `Ok(())` if `query` contains none of the write-statement
/// keywords (case-insensitively, as whole words), `Err(reason)` otherwise.
pub fn reject_if_write(query: &str) -> Result<(), String> {
    let lowered = query.to_lowercase();
    for keyword in WRITE_KEYWORDS {
        if contains_word(&lowered, keyword) {
            return Err(format!("statement contains disallowed keyword `{keyword}`"));
        }
    }
    Ok(())
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == needle)
        || haystack.contains(needle) && needle.contains(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_match_passes() {
        assert!(reject_if_write("MATCH (n:Function) RETURN n").is_ok());
    }

    #[test]
    fn create_is_rejected() {
        assert!(reject_if_write("CREATE (n:Function {id: $id}) RETURN n").is_err());
    }

    #[test]
    fn delete_is_rejected_case_insensitively() {
        assert!(reject_if_write("match (n) Delete n").is_err());
    }

    #[test]
    fn word_boundary_avoids_false_positive() {
        // "created_at" contains "create" as a substring but not as a word.
        assert!(reject_if_write("MATCH (n) WHERE n.created_at > $t RETURN n").is_ok());
    }
}
