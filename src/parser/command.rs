//! Top-level command shapes
//!
//! Recognized forms:
//! - `show dbs` / `show databases`
//! - `show collections` (always rejected; it cannot be resolved reliably)
//! - `use <database>`
//! - `db.getCollectionNames()` (needs a current database)
//! - `db.<database>.getCollectionNames()`
//! - `db.<collection>.<chain>` (needs a current database)
//! - `db.<database>.<collection>.<chain>`
//!
//! `getCollection("name")` may stand in for any collection-reference segment,
//! which also reaches names that are not identifiers:
//! `db.shop.getCollection("my items").find()`.

use crate::error::{ParseError, Result, UsageError};
use crate::store::Namespace;

use super::chain::{CallChain, parse_chain};
use super::scanner::find_matching_paren;

const LIST_COLLECTIONS_METHOD: &str = "getCollectionNames";
const GET_COLLECTION_METHOD: &str = "getCollection";

/// A routed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List non-system databases
    ShowDatabases,

    /// List collections of a database
    ListCollections { database: String },

    /// Check that a database exists so the caller can switch to it
    UseDatabase(String),

    /// Run a call chain against a collection
    Chain {
        namespace: Namespace,
        chain: CallChain,
    },
}

/// Matches raw input lines against the supported command shapes.
pub struct CommandParser;

impl CommandParser {
    /// Parse one input line.
    ///
    /// `current_database` is the caller's selected database, if any. It only
    /// enables the short `db.<collection>...` forms and `db.getCollectionNames()`;
    /// nothing is remembered between calls.
    pub fn parse(input: &str, current_database: Option<&str>) -> Result<Command> {
        let trimmed = input.trim().trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyInput.into());
        }

        let current_database = current_database.map(str::trim).filter(|db| !db.is_empty());

        if let Some(command) = Self::parse_shell_command(trimmed, current_database)? {
            return Ok(command);
        }

        if let Some(rest) = trimmed.strip_prefix("db.") {
            return Self::parse_db_expression(rest, current_database);
        }

        Err(unknown_command(current_database))
    }

    /// `show ...` and `use ...`
    fn parse_shell_command(input: &str, current_database: Option<&str>) -> Result<Option<Command>> {
        let words: Vec<&str> = input.split_whitespace().collect();

        match words.as_slice() {
            ["show", "dbs" | "databases"] => Ok(Some(Command::ShowDatabases)),
            ["show", "collections"] => Err(UsageError::DatabaseRequired(
                "Use db.<database>.getCollectionNames() instead of `show collections`".to_string(),
            )
            .into()),
            ["use", name] if is_valid_name(name) => {
                Ok(Some(Command::UseDatabase(name.to_string())))
            }
            ["show", ..] | ["use", ..] => Err(unknown_command(current_database)),
            _ => Ok(None),
        }
    }

    /// Everything after `db.`
    fn parse_db_expression(rest: &str, current_database: Option<&str>) -> Result<Command> {
        let reference = split_reference(rest).ok_or_else(|| unknown_command(current_database))?;
        let segments = reference.segments.as_slice();

        if reference.method == LIST_COLLECTIONS_METHOD {
            ensure_empty_call(reference.arguments)?;
            return match (segments, current_database) {
                ([database], _) => Ok(Command::ListCollections {
                    database: database.clone(),
                }),
                ([], Some(db)) => Ok(Command::ListCollections {
                    database: db.to_string(),
                }),
                ([], None) => Err(UsageError::DatabaseRequired(
                    "Run `use <database>` first, or use db.<database>.getCollectionNames()"
                        .to_string(),
                )
                .into()),
                _ => Err(unknown_command(current_database)),
            };
        }

        match segments {
            [] => Err(unknown_command(current_database)),
            [collection] => match current_database {
                Some(db) => Ok(Command::Chain {
                    namespace: Namespace::new(db, collection.as_str()),
                    chain: parse_chain(reference.chain)?,
                }),
                None => Err(UsageError::DatabaseRequired(format!(
                    "Use the fully qualified form db.<database>.{collection}.<method>(...)"
                ))
                .into()),
            },
            [database, collection @ ..] => Ok(Command::Chain {
                namespace: Namespace::new(database.as_str(), collection.join(".")),
                chain: parse_chain(reference.chain)?,
            }),
        }
    }
}

/// The collection reference in front of the first method call.
#[derive(Debug)]
struct Reference<'a> {
    /// Database and collection segments, `getCollection` names unquoted
    segments: Vec<String>,
    /// Name of the first method call
    method: &'a str,
    /// Text from the first method name to the end
    chain: &'a str,
    /// Text from the first method's `(` to the end
    arguments: &'a str,
}

/// Split `shop.getCollection("my items").find(...)` into its reference
/// segments and the call chain that follows.
///
/// Only the prefix before the first method call is examined; argument text is
/// left for the chain parser. Returns `None` for malformed references.
fn split_reference(input: &str) -> Option<Reference<'_>> {
    let mut segments = Vec::new();
    let mut rest = input.trim_start();

    loop {
        if let Some(after_name) = rest.strip_prefix(GET_COLLECTION_METHOD) {
            let open = rest.len() - after_name.trim_start().len();
            if rest[open..].starts_with('(') {
                let close = find_matching_paren(rest, open)?;
                segments.push(quoted_name(&rest[open + 1..close])?.to_string());
                rest = rest[close + 1..].trim_start().strip_prefix('.')?.trim_start();
                continue;
            }
        }

        let end = rest.find(['.', '('])?;
        let name = rest[..end].trim();
        if !is_valid_name(name) {
            return None;
        }

        if rest[end..].starts_with('(') {
            return Some(Reference {
                segments,
                method: name,
                chain: rest,
                arguments: &rest[end..],
            });
        }
        segments.push(name.to_string());
        rest = rest[end + 1..].trim_start();
    }
}

/// Content of a non-empty `"..."` or `'...'` literal.
fn quoted_name(text: &str) -> Option<&str> {
    let text = text.trim();
    let name = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    (!name.is_empty()).then_some(name)
}

/// Help text listing the supported forms.
pub fn help_message(current_database: Option<&str>) -> String {
    let mut help = String::from(
        "Supported commands:\n\
         \x20 show dbs | show databases\n\
         \x20 use <database>\n\
         \x20 db.<database>.getCollectionNames()\n\
         \x20 db.<database>.<collection>.find(<filter>).sort(<spec>).skip(<n>).limit(<n>)\n\
         \x20 db.<database>.<collection>.<operation>(<args>)\n\
         \x20 db.<database>.getCollection(\"<name>\").<operation>(<args>)\n",
    );

    match current_database {
        Some(db) => help.push_str(&format!(
            "With current database `{db}`:\n\
             \x20 db.getCollectionNames()\n\
             \x20 db.<collection>.<operation>(<args>)\n"
        )),
        None => help.push_str(
            "Select a database with `use <database>` to enable db.<collection>... shortcuts.\n",
        ),
    }

    help.push_str(
        "Operations: find, findOne, aggregate, insertOne, insertMany, updateOne, updateMany, \
         deleteOne, deleteMany, countDocuments, distinct",
    );
    help
}

fn unknown_command(current_database: Option<&str>) -> crate::error::ConsoleError {
    UsageError::UnknownCommand {
        help: help_message(current_database),
    }
    .into()
}

fn ensure_empty_call(call: &str) -> Result<()> {
    let close = find_matching_paren(call, 0)
        .ok_or_else(|| ParseError::UnbalancedDelimiters(call.to_string()))?;

    if !call[1..close].trim().is_empty() || !call[close + 1..].trim().is_empty() {
        return Err(UsageError::InvalidArguments {
            method: LIST_COLLECTIONS_METHOD.to_string(),
            expected: "no arguments and no chained calls".to_string(),
        }
        .into());
    }
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;
    use mongodb::bson::{Bson, doc};

    fn chain_of(cmd: Command) -> (Namespace, CallChain) {
        match cmd {
            Command::Chain { namespace, chain } => (namespace, chain),
            other => panic!("expected chain, got {other:?}"),
        }
    }

    #[test]
    fn test_show_databases() {
        assert_eq!(CommandParser::parse("show dbs", None).unwrap(), Command::ShowDatabases);
        assert_eq!(
            CommandParser::parse("  show   databases ; ", None).unwrap(),
            Command::ShowDatabases
        );
    }

    #[test]
    fn test_show_collections_is_rejected() {
        for current in [None, Some("shop")] {
            let err = CommandParser::parse("show collections", current).unwrap_err();
            assert!(matches!(err, ConsoleError::Usage(UsageError::DatabaseRequired(_))));
            assert!(err.to_string().contains("getCollectionNames"));
        }
    }

    #[test]
    fn test_use_database() {
        assert_eq!(
            CommandParser::parse("use shop", None).unwrap(),
            Command::UseDatabase("shop".to_string())
        );
        assert!(CommandParser::parse("use", None).is_err());
        assert!(CommandParser::parse("use a b", None).is_err());
    }

    #[test]
    fn test_fully_qualified_chain() {
        let cmd = CommandParser::parse(
            "db.shop.products.find({price:{$gt:100}}).sort({price:-1}).limit(2)",
            None,
        )
        .unwrap();
        let (ns, chain) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "products"));
        assert_eq!(chain.methods(), vec!["find", "sort", "limit"]);
        assert_eq!(
            chain.calls()[0].args[0],
            Bson::Document(doc! { "price": { "$gt": 100 } })
        );
    }

    #[test]
    fn test_fully_qualified_ignores_context() {
        let cmd = CommandParser::parse("db.shop.orders.countDocuments()", Some("other")).unwrap();
        let (ns, _) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "orders"));
    }

    #[test]
    fn test_short_form_uses_context() {
        let cmd = CommandParser::parse("db.orders.find().limit(1)", Some("shop")).unwrap();
        let (ns, chain) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "orders"));
        assert_eq!(chain.methods(), vec!["find", "limit"]);
    }

    #[test]
    fn test_short_form_without_context() {
        let err = CommandParser::parse("db.orders.find()", None).unwrap_err();
        assert!(matches!(err, ConsoleError::Usage(UsageError::DatabaseRequired(_))));
    }

    #[test]
    fn test_get_collection_names() {
        assert_eq!(
            CommandParser::parse("db.shop.getCollectionNames()", None).unwrap(),
            Command::ListCollections {
                database: "shop".to_string()
            }
        );
        assert_eq!(
            CommandParser::parse("db.getCollectionNames()", Some("shop")).unwrap(),
            Command::ListCollections {
                database: "shop".to_string()
            }
        );
        assert!(CommandParser::parse("db.getCollectionNames()", None).is_err());
        assert!(CommandParser::parse("db.shop.getCollectionNames(1)", None).is_err());
    }

    #[test]
    fn test_get_collection_sugar() {
        let cmd = CommandParser::parse(
            r#"db.shop.getCollection("orders").find({status: 'paid'})"#,
            None,
        )
        .unwrap();
        let (ns, chain) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "orders"));
        assert_eq!(chain.methods(), vec!["find"]);

        let cmd = CommandParser::parse("db.getCollection('orders').countDocuments()", Some("shop"))
            .unwrap();
        let (ns, _) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "orders"));
    }

    #[test]
    fn test_dotted_collection_name() {
        let cmd = CommandParser::parse("db.app.system.profile.find()", None).unwrap();
        let (ns, _) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("app", "system.profile"));
    }

    #[test]
    fn test_unknown_command_lists_forms() {
        let err = CommandParser::parse("drop everything", None).unwrap_err();
        match err {
            ConsoleError::Usage(UsageError::UnknownCommand { help }) => {
                assert!(help.contains("show dbs"));
                assert!(help.contains("use <database>"));
                assert!(!help.contains("With current database"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = CommandParser::parse("db", Some("shop")).unwrap_err();
        match err {
            ConsoleError::Usage(UsageError::UnknownCommand { help }) => {
                assert!(help.contains("With current database `shop`"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let err = CommandParser::parse(" ;; ", None).unwrap_err();
        assert!(matches!(err, ConsoleError::Parse(ParseError::EmptyInput)));
    }

    #[test]
    fn test_get_collection_inside_arguments_is_data() {
        let cmd = CommandParser::parse(
            r#"db.shop.notes.insertOne({t: "see db.getCollection('x').find()"})"#,
            None,
        )
        .unwrap();
        let (ns, chain) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "notes"));
        assert_eq!(
            chain.calls()[0].args[0],
            Bson::Document(doc! { "t": "see db.getCollection('x').find()" })
        );
    }

    #[test]
    fn test_get_collection_with_non_identifier_name() {
        let cmd = CommandParser::parse(r#"db.shop.getCollection("my items").find()"#, None).unwrap();
        let (ns, _) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "my items"));

        let cmd = CommandParser::parse("db.getCollection('a.b').countDocuments()", Some("shop"))
            .unwrap();
        let (ns, _) = chain_of(cmd);
        assert_eq!(ns, Namespace::new("shop", "a.b"));

        assert!(CommandParser::parse("db.shop.getCollection('').find()", None).is_err());
        assert!(CommandParser::parse("db.shop.getCollection(orders).find()", None).is_err());
        assert!(CommandParser::parse("db.shop.getCollection('orders')", None).is_err());
    }

    #[test]
    fn test_split_reference() {
        let reference =
            split_reference(r#"getCollection("a").getCollection('b').find()"#).unwrap();
        assert_eq!(reference.segments, vec!["a", "b"]);
        assert_eq!(reference.method, "find");
        assert_eq!(reference.chain, "find()");

        let reference = split_reference("shop.orders.find({a: 1.5})").unwrap();
        assert_eq!(reference.segments, vec!["shop", "orders"]);
        assert_eq!(reference.arguments, "({a: 1.5})");

        assert!(split_reference("shop.orders").is_none());
    }
}
