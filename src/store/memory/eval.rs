//! Filter, sort, projection and update evaluation over plain BSON documents

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use crate::error::{Result, StoreError};

/// True if `doc` matches a MongoDB-style filter document.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => all_of(doc, condition, key)?,
            "$or" => any_of(doc, condition, key)?,
            "$nor" => !any_of(doc, condition, key)?,
            op if op.starts_with('$') => {
                return Err(backend(format!("unsupported top-level operator {op}")));
            }
            path => match_field(get_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(condition: &'a Bson, op: &str) -> Result<Vec<&'a Document>> {
    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_document()
                    .ok_or_else(|| backend(format!("{op} entries must be documents")))
            })
            .collect(),
        _ => Err(backend(format!("{op} requires a non-empty array"))),
    }
}

fn all_of(doc: &Document, condition: &Bson, op: &str) -> Result<bool> {
    for clause in clauses(condition, op)? {
        if !matches(doc, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_of(doc: &Document, condition: &Bson, op: &str) -> Result<bool> {
    for clause in clauses(condition, op)? {
        if matches(doc, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluate the condition for one field path.
fn match_field(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Bson::Document(ops) = condition else {
        return Ok(equals(value, condition));
    };
    if !ops.keys().next().is_some_and(|k| k.starts_with('$')) {
        return Ok(equals(value, condition));
    }

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$in" => in_set(value, operand, op)?,
            "$nin" => !in_set(value, operand, op)?,
            "$exists" => value.is_some() == truthy(operand),
            other => return Err(backend(format!("unsupported query operator {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with array membership: `{tags: "a"}` matches `tags: ["a", "b"]`.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| same_value(item, expected))
        }
        Some(v) => same_value(v, expected),
    }
}

fn same_value(a: &Bson, b: &Bson) -> bool {
    if is_number(a) && is_number(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Bson| comparable(v, operand) && accept(compare_bson(v, operand));
    match value {
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(v) => check(v),
        None => false,
    }
}

/// Range operators only compare values of the same kind.
fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_number(a) && is_number(b)) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn in_set(value: Option<&Bson>, operand: &Bson, op: &str) -> Result<bool> {
    let Bson::Array(set) = operand else {
        return Err(backend(format!("{op} requires an array")));
    };
    Ok(set.iter().any(|candidate| equals(value, candidate)))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Resolve a dotted path such as `address.city`.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = doc;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let value = current.get(part)?;
        if parts.peek().is_none() {
            return Some(value);
        }
        match value {
            Bson::Document(next) => current = next,
            _ => return None,
        }
    }
    None
}

/// Total order over BSON values; numbers compare across numeric types.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_number(a) && is_number(b) {
        return as_f64(a).total_cmp(&as_f64(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn is_number(value: &Bson) -> bool {
    matches!(
        value,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
    )
}

fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        Bson::Decimal128(d) => d.to_string().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

/// Cross-type ordering, following the server's sort order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Sort in place by a `{field: 1 | -1}` specification.
pub fn sort_documents(docs: &mut [Document], spec: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match direction {
            Bson::Int32(n) if *n == 1 || *n == -1 => *n < 0,
            Bson::Int64(n) if *n == 1 || *n == -1 => *n < 0,
            Bson::Double(n) if *n == 1.0 || *n == -1.0 => *n < 0.0,
            other => {
                return Err(backend(format!(
                    "invalid sort direction for {field}: {other}"
                )));
            }
        };
        keys.push((field.as_str(), descending));
    }

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ord = match (get_path(a, field), get_path(b, field)) {
                (Some(x), Some(y)) => compare_bson(x, y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return if *descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Apply an inclusion or exclusion projection.
///
/// `_id` is kept unless excluded explicitly. Mixing inclusion and exclusion
/// of other fields is rejected.
pub fn project(doc: &Document, projection: &Document) -> Result<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, flag) in projection {
        let on = truthy(flag);
        if field == "_id" {
            include_id = on;
        } else if on {
            included.push(field.as_str());
        } else {
            excluded.push(field.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(backend(
            "cannot mix inclusion and exclusion in a projection".to_string(),
        ));
    }

    if included.is_empty() {
        let mut out = doc.clone();
        for field in excluded {
            remove_path(&mut out, field);
        }
        if !include_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if include_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for field in included {
        if let Some(value) = get_path(doc, field) {
            set_path(&mut out, field, value.clone())?;
        }
    }
    Ok(out)
}

/// Apply a `$set` / `$unset` / `$inc` update document.
///
/// Returns whether the document changed. Replacement documents (no operator
/// keys) are rejected, as the server does for `updateOne`/`updateMany`.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool> {
    if update.is_empty() || update.keys().any(|k| !k.starts_with('$')) {
        return Err(backend(
            "update document requires atomic operators such as $set".to_string(),
        ));
    }

    let mut changed = false;
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| backend(format!("{op} requires a document")))?;

        for (path, value) in fields {
            if path == "_id" {
                return Err(backend("the _id field is immutable".to_string()));
            }
            changed |= match op.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$unset" => remove_path(doc, path),
                "$inc" => increment_path(doc, path, value)?,
                other => return Err(backend(format!("unsupported update operator {other}"))),
            };
        }
    }
    Ok(changed)
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<bool> {
    let (parent, last) = parent_mut(root, path)?;
    let old = parent.insert(last, value.clone());
    Ok(old.as_ref() != Some(&value))
}

fn remove_path(root: &mut Document, path: &str) -> bool {
    let mut current = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return current.remove(part).is_some();
        }
        match current.get_mut(part) {
            Some(Bson::Document(next)) => current = next,
            _ => return false,
        }
    }
    false
}

fn increment_path(root: &mut Document, path: &str, by: &Bson) -> Result<bool> {
    if !is_number(by) {
        return Err(backend(format!("$inc value for {path} must be numeric")));
    }

    let next = match get_path(root, path) {
        None => by.clone(),
        Some(current) if is_number(current) => add_numbers(current, by),
        Some(_) => {
            return Err(backend(format!("cannot apply $inc to non-numeric field {path}")));
        }
    };
    set_path(root, path, next)
}

/// Integer addition stays integral while it fits.
fn add_numbers(a: &Bson, b: &Bson) -> Bson {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x
            .checked_add(*y)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*x) + i64::from(*y))),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            match (as_i64(a), as_i64(b)) {
                (Some(x), Some(y)) => x
                    .checked_add(y)
                    .map(Bson::Int64)
                    .unwrap_or(Bson::Double(as_f64(a) + as_f64(b))),
                _ => Bson::Double(as_f64(a) + as_f64(b)),
            }
        }
        _ => Bson::Double(as_f64(a) + as_f64(b)),
    }
}

/// Walk to the parent of the last segment, creating missing subdocuments.
///
/// A segment that names an existing non-document value (scalar or array) is
/// an error; the value is never replaced.
fn parent_mut<'a>(root: &'a mut Document, path: &str) -> Result<(&'a mut Document, String)> {
    let mut current = root;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return Ok((current, part.to_string()));
        }
        if !current.contains_key(part) {
            current.insert(part, Document::new());
        }
        current = match current.get_mut(part) {
            Some(Bson::Document(next)) => next,
            _ => return Err(backend(format!("cannot update {path}: {part} is not a document"))),
        };
    }
    Err(backend("update path must not be empty".to_string()))
}

/// Values of `field` across documents, arrays flattened, duplicates removed.
pub fn distinct_values<'a>(docs: impl IntoIterator<Item = &'a Document>, field: &str) -> Vec<Bson> {
    let mut values: Vec<Bson> = Vec::new();
    let mut push = |value: &Bson| {
        if !values.iter().any(|seen| same_value(seen, value)) {
            values.push(value.clone());
        }
    };

    for doc in docs {
        match get_path(doc, field) {
            Some(Bson::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    values.sort_by(compare_bson);
    values
}

/// Run a pipeline of `$match $sort $skip $limit $project $count` stages.
pub fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    for stage in pipeline {
        if stage.len() != 1 {
            return Err(backend(
                "each pipeline stage must have exactly one operator".to_string(),
            ));
        }
        let Some((name, spec)) = stage.iter().next() else {
            continue;
        };

        docs = match name.as_str() {
            "$match" => {
                let filter = stage_document(name, spec)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$sort" => {
                sort_documents(&mut docs, stage_document(name, spec)?)?;
                docs
            }
            "$skip" => {
                let n = stage_count(name, spec)?;
                docs.into_iter().skip(n).collect()
            }
            "$limit" => {
                let n = stage_count(name, spec)?;
                if n == 0 {
                    return Err(backend("$limit must be positive".to_string()));
                }
                docs.into_iter().take(n).collect()
            }
            "$project" => {
                let projection = stage_document(name, spec)?;
                docs.iter()
                    .map(|doc| project(doc, projection))
                    .collect::<Result<Vec<_>>>()?
            }
            "$count" => {
                let field = spec
                    .as_str()
                    .filter(|f| !f.is_empty() && !f.starts_with('$'))
                    .ok_or_else(|| backend("$count requires a field name".to_string()))?;
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field, count_bson(docs.len()));
                    vec![out]
                }
            }
            other => return Err(backend(format!("unsupported pipeline stage {other}"))),
        };
    }
    Ok(docs)
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> Result<&'a Document> {
    spec.as_document()
        .ok_or_else(|| backend(format!("{name} requires a document")))
}

fn stage_count(name: &str, spec: &Bson) -> Result<usize> {
    let n = match spec {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => -1,
    };
    usize::try_from(n).map_err(|_| backend(format!("{name} requires a non-negative integer")))
}

fn count_bson(n: usize) -> Bson {
    i32::try_from(n)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(n as i64))
}

fn backend(message: String) -> crate::error::ConsoleError {
    StoreError::Backend(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn person() -> Document {
        doc! {
            "name": "Ana",
            "age": 31,
            "score": 7.5,
            "tags": ["a", "b"],
            "address": { "city": "Lisbon", "zip": "1000" },
        }
    }

    #[test]
    fn test_equality_and_dotted_paths() {
        let d = person();
        assert!(matches(&d, &doc! { "name": "Ana" }).unwrap());
        assert!(matches(&d, &doc! { "address.city": "Lisbon" }).unwrap());
        assert!(!matches(&d, &doc! { "address.city": "Porto" }).unwrap());
        assert!(matches(&d, &doc! {}).unwrap());
    }

    #[test]
    fn test_comparison_operators() {
        let d = person();
        assert!(matches(&d, &doc! { "age": { "$gt": 30 } }).unwrap());
        assert!(matches(&d, &doc! { "age": { "$gte": 31.0, "$lt": 40_i64 } }).unwrap());
        assert!(!matches(&d, &doc! { "age": { "$lte": 30 } }).unwrap());
        assert!(matches(&d, &doc! { "age": { "$ne": 30 } }).unwrap());
        assert!(!matches(&d, &doc! { "name": { "$gt": 5 } }).unwrap());
    }

    #[test]
    fn test_set_operators_and_arrays() {
        let d = person();
        assert!(matches(&d, &doc! { "tags": "a" }).unwrap());
        assert!(matches(&d, &doc! { "tags": { "$in": ["x", "b"] } }).unwrap());
        assert!(matches(&d, &doc! { "name": { "$nin": ["Bob"] } }).unwrap());
        assert!(matches(&d, &doc! { "missing": { "$exists": false } }).unwrap());
        assert!(matches(&d, &doc! { "missing": null }).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let d = person();
        assert!(matches(&d, &doc! { "$or": [{ "age": 1 }, { "name": "Ana" }] }).unwrap());
        assert!(!matches(&d, &doc! { "$and": [{ "age": 31 }, { "name": "Bob" }] }).unwrap());
        assert!(matches(&d, &doc! { "$nor": [{ "age": 1 }] }).unwrap());
        assert!(matches(&d, &doc! { "$or": [] }).is_err());
    }

    #[test]
    fn test_unknown_operator_is_error() {
        assert!(matches(&person(), &doc! { "age": { "$regex": "x" } }).is_err());
    }

    #[test]
    fn test_sort_mixed_numeric_types() {
        let mut docs = vec![
            doc! { "p": 5.5 },
            doc! { "p": 10_i64 },
            doc! { "p": 1 },
            doc! {},
        ];
        sort_documents(&mut docs, &doc! { "p": -1 }).unwrap();
        let order: Vec<Option<&Bson>> = docs.iter().map(|d| d.get("p")).collect();
        assert_eq!(
            order,
            vec![
                Some(&Bson::Int64(10)),
                Some(&Bson::Double(5.5)),
                Some(&Bson::Int32(1)),
                None
            ]
        );
        assert!(sort_documents(&mut docs, &doc! { "p": 2 }).is_err());
    }

    #[test]
    fn test_projection() {
        let d = person();
        assert_eq!(
            project(&d, &doc! { "name": 1, "address.city": 1 }).unwrap(),
            doc! { "name": "Ana", "address": { "city": "Lisbon" } }
        );
        let excluded = project(&d, &doc! { "tags": 0, "address": 0 }).unwrap();
        assert!(excluded.get("tags").is_none());
        assert!(excluded.get("name").is_some());
        assert!(project(&d, &doc! { "name": 1, "tags": 0 }).is_err());
    }

    #[test]
    fn test_apply_update() {
        let mut d = person();
        let update = doc! { "$set": { "address.city": "Porto" }, "$inc": { "age": 1 } };
        assert!(apply_update(&mut d, &update).unwrap());
        assert_eq!(get_path(&d, "address.city"), Some(&Bson::String("Porto".into())));
        assert_eq!(d.get("age"), Some(&Bson::Int32(32)));

        assert!(apply_update(&mut d, &doc! { "$unset": { "tags": "" } }).unwrap());
        assert!(d.get("tags").is_none());

        assert!(!apply_update(&mut d, &doc! { "$set": { "name": "Ana" } }).unwrap());
        assert!(apply_update(&mut d, &doc! { "name": "Replaced" }).is_err());
        assert!(apply_update(&mut d, &doc! { "$set": { "_id": 1 } }).is_err());
    }

    #[test]
    fn test_set_through_array_is_rejected() {
        let mut d = person();
        let err = apply_update(&mut d, &doc! { "$set": { "tags.0": "x" } }).unwrap_err();
        assert!(err.to_string().contains("tags is not a document"));
        assert_eq!(d.get("tags"), Some(&Bson::Array(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn test_inc_through_scalar_is_rejected() {
        let mut d = person();
        assert!(apply_update(&mut d, &doc! { "$inc": { "age.years": 1 } }).is_err());
        assert_eq!(d.get("age"), Some(&Bson::Int32(31)));

        assert!(apply_update(&mut d, &doc! { "$inc": { "stats.visits": 1 } }).unwrap());
        assert_eq!(get_path(&d, "stats.visits"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn test_distinct_flattens_arrays() {
        let docs = vec![
            doc! { "tags": ["a", "b"] },
            doc! { "tags": "c" },
            doc! { "tags": ["b"] },
            doc! {},
        ];
        assert_eq!(
            distinct_values(&docs, "tags"),
            vec![
                Bson::String("a".into()),
                Bson::String("b".into()),
                Bson::String("c".into())
            ]
        );
    }

    #[test]
    fn test_pipeline() {
        let docs = vec![
            doc! { "k": "x", "n": 3 },
            doc! { "k": "y", "n": 1 },
            doc! { "k": "x", "n": 2 },
        ];
        let out = run_pipeline(
            docs.clone(),
            &[
                doc! { "$match": { "k": "x" } },
                doc! { "$sort": { "n": 1 } },
                doc! { "$project": { "_id": 0, "n": 1 } },
            ],
        )
        .unwrap();
        assert_eq!(out, vec![doc! { "n": 2 }, doc! { "n": 3 }]);

        let counted = run_pipeline(docs, &[doc! { "$count": "total" }]).unwrap();
        assert_eq!(counted, vec![doc! { "total": 3 }]);

        assert!(run_pipeline(Vec::new(), &[doc! { "$group": {} }]).is_err());
    }
}
