//! The content-aware RCS differ: compares two parsed `,v`
//! structures field by field instead of treating the file as an opaque
//! blob, so a single new revision only costs its own deltatext on the
//! wire instead of the whole file.
//!
//! Operates directly on [`cvsync_rcs::types::File`] values. [`encode`]/
//! [`decode`] give `RcsDiff` its own wire form: each present field is a
//! `tags::rcs_field` tag followed by the field's bytes, with list fields
//! (`ACCESS`/`SYMBOLS`/`LOCKS`/`DELTA`/`DELTATEXT`) further broken into one
//! `tags::sub_op` entry per added or removed key.

use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};

use cvsync_checksum::HashAlgorithm;
use cvsync_rcs::types::{Delta, DeltaText, Desc, File, Id, Sym};
use cvsync_rcs::Num;

use crate::error::PipelineError;
use crate::tags::{rcs_field, sub_op};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<K, V> {
    Add(K, V),
    Remove(K),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RcsDiff {
    pub head: Option<Option<Num>>,
    pub branch: Option<Option<Num>>,
    pub access: Vec<ListChange<Id, ()>>,
    pub symbols: Vec<ListChange<Sym, Num>>,
    pub locks: Vec<ListChange<Id, Num>>,
    pub locks_strict: Option<bool>,
    pub comment: Option<Option<cvsync_rcs::types::VString>>,
    pub expand: Option<Option<cvsync_rcs::types::VString>>,
    pub desc: Option<Desc>,
    pub deltas: Vec<ListChange<Num, Delta>>,
    pub delta_texts: Vec<ListChange<Num, DeltaText>>,
}

impl RcsDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
            && self.branch.is_none()
            && self.access.is_empty()
            && self.symbols.is_empty()
            && self.locks.is_empty()
            && self.locks_strict.is_none()
            && self.comment.is_none()
            && self.expand.is_none()
            && self.desc.is_none()
            && self.deltas.is_empty()
            && self.delta_texts.is_empty()
    }
}

/// A hash over the admin fields of one delta, used to decide whether a
/// revision already shared by both peers needs its admin fields refreshed
/// without re-sending them if nothing changed.
#[must_use]
pub fn delta_digest(delta: &Delta, algorithm: HashAlgorithm) -> Vec<u8> {
    let mut hasher = algorithm.hasher();
    hasher.update(
        &delta
            .date
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_be_bytes(),
    );
    hasher.update(&delta.author);
    if let Some(state) = &delta.state {
        hasher.update(state);
    }
    for branch in &delta.branches {
        hasher.update(branch.to_string().as_bytes());
    }
    if let Some(next) = &delta.next {
        hasher.update(next.to_string().as_bytes());
    }
    hasher.finalize()
}

fn diff_list<K, V>(base: &HashMap<K, V>, target: &HashMap<K, V>) -> Vec<ListChange<K, V>>
where
    K: std::hash::Hash + Eq + Clone,
    V: PartialEq + Clone,
{
    let mut changes = Vec::new();
    let keys: std::collections::HashSet<&K> = base.keys().chain(target.keys()).collect();

    for key in keys {
        match (base.get(key), target.get(key)) {
            (Some(_), None) => changes.push(ListChange::Remove(key.clone())),
            (None, Some(v)) => changes.push(ListChange::Add(key.clone(), v.clone())),
            (Some(b), Some(t)) if b != t => {
                changes.push(ListChange::Remove(key.clone()));
                changes.push(ListChange::Add(key.clone(), t.clone()));
            }
            _ => {}
        }
    }
    changes
}

/// Builds the field-level diff needed to turn `base` into `target`.
#[must_use]
pub fn diff(base: &File, target: &File, algorithm: HashAlgorithm) -> RcsDiff {
    let mut out = RcsDiff::default();

    if base.admin.head != target.admin.head {
        out.head = Some(target.admin.head.clone());
    }
    if base.admin.branch != target.admin.branch {
        out.branch = Some(target.admin.branch.clone());
    }

    let base_access: std::collections::HashSet<_> = base.admin.access.iter().cloned().collect();
    let target_access: std::collections::HashSet<_> = target.admin.access.iter().cloned().collect();
    for id in base_access.difference(&target_access) {
        out.access.push(ListChange::Remove(id.clone()));
    }
    for id in target_access.difference(&base_access) {
        out.access.push(ListChange::Add(id.clone(), ()));
    }

    out.symbols = diff_list(&base.admin.symbols, &target.admin.symbols);
    out.locks = diff_list(&base.admin.locks, &target.admin.locks);
    if base.admin.strict != target.admin.strict {
        out.locks_strict = Some(target.admin.strict);
    }
    if base.admin.comment != target.admin.comment {
        out.comment = Some(target.admin.comment.clone());
    }
    if base.admin.expand != target.admin.expand {
        out.expand = Some(target.admin.expand.clone());
    }
    if base.desc != target.desc {
        out.desc = Some(target.desc.clone());
    }

    for key in base.delta.keys().chain(target.delta.keys()).collect::<std::collections::HashSet<_>>() {
        match (base.delta.get(key), target.delta.get(key)) {
            (Some(_), None) => out.deltas.push(ListChange::Remove(key.clone())),
            (None, Some(d)) => out.deltas.push(ListChange::Add(key.clone(), d.clone())),
            (Some(b), Some(t)) if delta_digest(b, algorithm) != delta_digest(t, algorithm) => {
                out.deltas.push(ListChange::Add(key.clone(), t.clone()))
            }
            _ => {}
        }
    }
    for key in base.delta_text.keys().chain(target.delta_text.keys()).collect::<std::collections::HashSet<_>>() {
        let base_digest = base.delta_text.get(key).map(|t| digest_text(t, algorithm));
        let target_digest = target.delta_text.get(key).map(|t| digest_text(t, algorithm));
        match (base.delta_text.get(key), target.delta_text.get(key)) {
            (Some(_), None) => out.delta_texts.push(ListChange::Remove(key.clone())),
            (None, Some(t)) => out.delta_texts.push(ListChange::Add(key.clone(), t.clone())),
            (Some(_), Some(t)) if base_digest != target_digest => {
                out.delta_texts.push(ListChange::Add(key.clone(), t.clone()))
            }
            _ => {}
        }
    }

    out
}

fn digest_text(text: &DeltaText, algorithm: HashAlgorithm) -> Vec<u8> {
    let mut hasher = algorithm.hasher();
    hasher.update(&text.log.0);
    hasher.update(&text.text.0);
    hasher.finalize()
}

/// Applies `diff` to `base`, producing the file it was computed against.
#[must_use]
pub fn apply(base: &File, diff: &RcsDiff) -> File {
    let mut admin = base.admin.clone();
    if let Some(head) = &diff.head {
        admin.head.clone_from(head);
    }
    if let Some(branch) = &diff.branch {
        admin.branch.clone_from(branch);
    }
    for change in &diff.access {
        match change {
            ListChange::Add(id, ()) => {
                if !admin.access.contains(id) {
                    admin.access.push(id.clone());
                }
            }
            ListChange::Remove(id) => admin.access.retain(|existing| existing != id),
        }
    }
    apply_map(&mut admin.symbols, &diff.symbols);
    apply_map(&mut admin.locks, &diff.locks);
    if let Some(strict) = diff.locks_strict {
        admin.strict = strict;
    }
    if let Some(comment) = &diff.comment {
        admin.comment.clone_from(comment);
    }
    if let Some(expand) = &diff.expand {
        admin.expand.clone_from(expand);
    }

    let mut delta = base.delta.clone();
    apply_map(&mut delta, &diff.deltas);

    let mut delta_text = base.delta_text.clone();
    apply_map(&mut delta_text, &diff.delta_texts);

    let desc = diff.desc.clone().unwrap_or_else(|| base.desc.clone());

    File { admin, delta, desc, delta_text }
}

fn apply_map<K, V>(map: &mut HashMap<K, V>, changes: &[ListChange<K, V>])
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    for change in changes {
        match change {
            ListChange::Add(k, v) => {
                map.insert(k.clone(), v.clone());
            }
            ListChange::Remove(k) => {
                map.remove(k);
            }
        }
    }
}

fn write_short(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_short<'a>(input: &'a [u8], pos: &mut usize) -> Result<&'a [u8], PipelineError> {
    let len = read_u16(input, pos)? as usize;
    let end = pos.checked_add(len).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    let slice = input.get(*pos..end).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    *pos = end;
    Ok(slice)
}

fn write_long(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_long<'a>(input: &'a [u8], pos: &mut usize) -> Result<&'a [u8], PipelineError> {
    let len = read_u32(input, pos)? as usize;
    let end = pos.checked_add(len).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    let slice = input.get(*pos..end).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    *pos = end;
    Ok(slice)
}

fn read_u8(input: &[u8], pos: &mut usize) -> Result<u8, PipelineError> {
    let &b = input.get(*pos).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    *pos += 1;
    Ok(b)
}

fn read_u16(input: &[u8], pos: &mut usize) -> Result<u16, PipelineError> {
    let end = pos.checked_add(2).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    let v = u16::from_be_bytes(input.get(*pos..end).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?.try_into().unwrap());
    *pos = end;
    Ok(v)
}

fn read_u32(input: &[u8], pos: &mut usize) -> Result<u32, PipelineError> {
    let end = pos.checked_add(4).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    let v = u32::from_be_bytes(input.get(*pos..end).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?.try_into().unwrap());
    *pos = end;
    Ok(v)
}

fn read_i64(input: &[u8], pos: &mut usize) -> Result<i64, PipelineError> {
    let end = pos.checked_add(8).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?;
    let v = i64::from_be_bytes(input.get(*pos..end).ok_or(PipelineError::RcsDiffTruncated { offset: *pos })?.try_into().unwrap());
    *pos = end;
    Ok(v)
}

fn write_id(out: &mut Vec<u8>, id: &Id) {
    write_short(out, &id.0);
}

fn read_id(input: &[u8], pos: &mut usize) -> Result<Id, PipelineError> {
    Ok(Id(read_short(input, pos)?.to_vec()))
}

fn write_sym(out: &mut Vec<u8>, sym: &Sym) {
    write_short(out, &sym.0);
}

fn read_sym(input: &[u8], pos: &mut usize) -> Result<Sym, PipelineError> {
    Ok(Sym(read_short(input, pos)?.to_vec()))
}

fn write_num(out: &mut Vec<u8>, num: &Num) {
    write_short(out, num.to_string().as_bytes());
}

fn read_num(input: &[u8], pos: &mut usize) -> Result<Num, PipelineError> {
    let text = std::str::from_utf8(read_short(input, pos)?).map_err(|_| PipelineError::RcsDiffTruncated { offset: *pos })?;
    text.parse::<Num>().map_err(PipelineError::Rcs)
}

fn write_opt_num(out: &mut Vec<u8>, num: &Option<Num>) {
    match num {
        Some(n) => {
            out.push(1);
            write_num(out, n);
        }
        None => out.push(0),
    }
}

fn read_opt_num(input: &[u8], pos: &mut usize) -> Result<Option<Num>, PipelineError> {
    match read_u8(input, pos)? {
        0 => Ok(None),
        _ => Ok(Some(read_num(input, pos)?)),
    }
}

fn write_vstring(out: &mut Vec<u8>, s: &cvsync_rcs::types::VString) {
    write_long(out, &s.0);
}

fn read_vstring(input: &[u8], pos: &mut usize) -> Result<cvsync_rcs::types::VString, PipelineError> {
    Ok(cvsync_rcs::types::VString(read_long(input, pos)?.to_vec()))
}

fn write_opt_vstring(out: &mut Vec<u8>, s: &Option<cvsync_rcs::types::VString>) {
    match s {
        Some(v) => {
            out.push(1);
            write_vstring(out, v);
        }
        None => out.push(0),
    }
}

fn read_opt_vstring(input: &[u8], pos: &mut usize) -> Result<Option<cvsync_rcs::types::VString>, PipelineError> {
    match read_u8(input, pos)? {
        0 => Ok(None),
        _ => Ok(Some(read_vstring(input, pos)?)),
    }
}

fn write_delta(out: &mut Vec<u8>, delta: &Delta) {
    let secs = delta.date.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
    out.extend_from_slice(&secs.to_be_bytes());
    write_id(out, &delta.author);
    match &delta.state {
        Some(s) => {
            out.push(1);
            write_id(out, s);
        }
        None => out.push(0),
    }
    out.extend_from_slice(&(delta.branches.len() as u16).to_be_bytes());
    for branch in &delta.branches {
        write_num(out, branch);
    }
    write_opt_num(out, &delta.next);
    match &delta.commit_id {
        Some(s) => {
            out.push(1);
            write_sym(out, s);
        }
        None => out.push(0),
    }
}

fn read_delta(input: &[u8], pos: &mut usize) -> Result<Delta, PipelineError> {
    let secs = read_i64(input, pos)?;
    let date = UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64);
    let author = read_id(input, pos)?;
    let state = match read_u8(input, pos)? {
        0 => None,
        _ => Some(read_id(input, pos)?),
    };
    let branch_count = read_u16(input, pos)?;
    let mut branches = Vec::with_capacity(branch_count as usize);
    for _ in 0..branch_count {
        branches.push(read_num(input, pos)?);
    }
    let next = read_opt_num(input, pos)?;
    let commit_id = match read_u8(input, pos)? {
        0 => None,
        _ => Some(read_sym(input, pos)?),
    };
    Ok(Delta { date, author, state, branches, next, commit_id })
}

fn write_delta_text(out: &mut Vec<u8>, text: &DeltaText) {
    write_vstring(out, &text.log);
    write_vstring(out, &text.text);
}

fn read_delta_text(input: &[u8], pos: &mut usize) -> Result<DeltaText, PipelineError> {
    let log = read_vstring(input, pos)?;
    let text = read_vstring(input, pos)?;
    Ok(DeltaText { log, text })
}

fn write_list<K, V>(out: &mut Vec<u8>, changes: &[ListChange<K, V>], write_key: impl Fn(&mut Vec<u8>, &K), write_value: impl Fn(&mut Vec<u8>, &V)) {
    out.extend_from_slice(&(changes.len() as u32).to_be_bytes());
    for change in changes {
        match change {
            ListChange::Add(k, v) => {
                out.push(sub_op::ADD);
                write_key(out, k);
                write_value(out, v);
            }
            ListChange::Remove(k) => {
                out.push(sub_op::REMOVE);
                write_key(out, k);
            }
        }
    }
}

fn read_list<K, V>(
    input: &[u8],
    pos: &mut usize,
    read_key: impl Fn(&[u8], &mut usize) -> Result<K, PipelineError>,
    read_value: impl Fn(&[u8], &mut usize) -> Result<V, PipelineError>,
) -> Result<Vec<ListChange<K, V>>, PipelineError> {
    let count = read_u32(input, pos)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let op = read_u8(input, pos)?;
        let key = read_key(input, pos)?;
        out.push(match op {
            sub_op::ADD => ListChange::Add(key, read_value(input, pos)?),
            sub_op::REMOVE => ListChange::Remove(key),
            other => return Err(PipelineError::UnknownRcsField(other)),
        });
    }
    Ok(out)
}

/// Serializes `diff` as a sequence of `(tags::rcs_field tag, field bytes)`
/// entries, one per field that actually changed; fields left at their
/// default (unchanged) carry no bytes at all.
#[must_use]
pub fn encode(diff: &RcsDiff) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(head) = &diff.head {
        out.push(rcs_field::HEAD);
        write_opt_num(&mut out, head);
    }
    if let Some(branch) = &diff.branch {
        out.push(rcs_field::BRANCH);
        write_opt_num(&mut out, branch);
    }
    if !diff.access.is_empty() {
        out.push(rcs_field::ACCESS);
        write_list(&mut out, &diff.access, |o, id| write_id(o, id), |_, ()| {});
    }
    if !diff.symbols.is_empty() {
        out.push(rcs_field::SYMBOLS);
        write_list(&mut out, &diff.symbols, |o, sym| write_sym(o, sym), |o, num| write_num(o, num));
    }
    if !diff.locks.is_empty() {
        out.push(rcs_field::LOCKS);
        write_list(&mut out, &diff.locks, |o, id| write_id(o, id), |o, num| write_num(o, num));
    }
    if let Some(strict) = diff.locks_strict {
        out.push(rcs_field::LOCKS_STRICT);
        out.push(u8::from(strict));
    }
    if let Some(comment) = &diff.comment {
        out.push(rcs_field::COMMENT);
        write_opt_vstring(&mut out, comment);
    }
    if let Some(expand) = &diff.expand {
        out.push(rcs_field::EXPAND);
        write_opt_vstring(&mut out, expand);
    }
    if let Some(desc) = &diff.desc {
        out.push(rcs_field::DESC);
        write_vstring(&mut out, desc);
    }
    if !diff.deltas.is_empty() {
        out.push(rcs_field::DELTA);
        write_list(&mut out, &diff.deltas, |o, num| write_num(o, num), |o, delta| write_delta(o, delta));
    }
    if !diff.delta_texts.is_empty() {
        out.push(rcs_field::DELTATEXT);
        write_list(&mut out, &diff.delta_texts, |o, num| write_num(o, num), |o, text| write_delta_text(o, text));
    }
    out
}

/// Inverse of [`encode`]. Reads fields until `input` is exhausted.
pub fn decode(input: &[u8]) -> Result<RcsDiff, PipelineError> {
    let mut out = RcsDiff::default();
    let mut pos = 0usize;
    while pos < input.len() {
        let tag = read_u8(input, &mut pos)?;
        match tag {
            rcs_field::HEAD => out.head = Some(read_opt_num(input, &mut pos)?),
            rcs_field::BRANCH => out.branch = Some(read_opt_num(input, &mut pos)?),
            rcs_field::ACCESS => out.access = read_list(input, &mut pos, read_id, |_, _| Ok(()))?,
            rcs_field::SYMBOLS => out.symbols = read_list(input, &mut pos, read_sym, read_num)?,
            rcs_field::LOCKS => out.locks = read_list(input, &mut pos, read_id, read_num)?,
            rcs_field::LOCKS_STRICT => out.locks_strict = Some(read_u8(input, &mut pos)? != 0),
            rcs_field::COMMENT => out.comment = Some(read_opt_vstring(input, &mut pos)?),
            rcs_field::EXPAND => out.expand = Some(read_opt_vstring(input, &mut pos)?),
            rcs_field::DESC => out.desc = Some(read_vstring(input, &mut pos)?),
            rcs_field::DELTA => out.deltas = read_list(input, &mut pos, read_num, read_delta)?,
            rcs_field::DELTATEXT => out.delta_texts = read_list(input, &mut pos, read_num, read_delta_text)?,
            other => return Err(PipelineError::UnknownRcsField(other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_rcs::parse_file;

    fn sample(text_11: &str) -> File {
        let src = format!(
            "head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t95.01.01.00.00.00;\tauthor me;\tstate Exp;\nbranches;\nnext;\n\ndesc\n@@\n\n1.1\nlog\n@@\ntext\n@{text_11}@\n"
        );
        parse_file(src.as_bytes()).unwrap()
    }

    #[test]
    fn identical_files_diff_to_empty() {
        let a = sample("hello");
        let b = sample("hello");
        let d = diff(&a, &b, HashAlgorithm::Md5);
        assert!(d.is_empty());
    }

    #[test]
    fn changed_text_round_trips_through_diff_and_apply() {
        let a = sample("hello");
        let b = sample("world");
        let d = diff(&a, &b, HashAlgorithm::Md5);
        assert!(!d.is_empty());
        let applied = apply(&a, &d);
        let rev = applied.head().unwrap().clone();
        assert_eq!(applied.delta_text.get(&rev).unwrap().text.0, b"world");
    }

    #[test]
    fn new_revision_is_added_via_delta_and_deltatext_changes() {
        let mut b = sample("hello");
        let new_rev: Num = "1.2".parse().unwrap();
        b.admin.head = Some(new_rev.clone());
        b.delta.insert(
            new_rev.clone(),
            Delta {
                date: std::time::SystemTime::UNIX_EPOCH,
                author: Id(b"me".to_vec()),
                state: Some(Id(b"Exp".to_vec())),
                branches: Vec::new(),
                next: Some("1.1".parse().unwrap()),
                commit_id: None,
            },
        );
        b.delta_text.insert(
            new_rev,
            DeltaText { log: cvsync_rcs::types::VString(Vec::new()), text: cvsync_rcs::types::VString(b"newer".to_vec()) },
        );

        let a = sample("hello");
        let d = diff(&a, &b, HashAlgorithm::Md5);
        assert!(d.head.is_some());
        assert_eq!(d.deltas.len(), 1);
        assert_eq!(d.delta_texts.len(), 1);

        let applied = apply(&a, &d);
        assert_eq!(applied.admin.head, b.admin.head);
        assert_eq!(applied.delta.len(), 2);
    }

    #[test]
    fn encode_decode_round_trips_an_empty_diff() {
        let d = RcsDiff::default();
        assert_eq!(decode(&encode(&d)).unwrap(), d);
    }

    #[test]
    fn encode_decode_round_trips_a_full_diff() {
        let a = sample("hello");
        let mut b = sample("hello");
        let new_rev: Num = "1.2".parse().unwrap();
        b.admin.head = Some(new_rev.clone());
        b.admin.access.push(Id(b"alice".to_vec()));
        b.admin.symbols.insert(Sym(b"REL_1".to_vec()), "1.1".parse().unwrap());
        b.admin.strict = !a.admin.strict;
        b.delta.insert(
            new_rev.clone(),
            Delta {
                date: std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(820454400),
                author: Id(b"me".to_vec()),
                state: Some(Id(b"Exp".to_vec())),
                branches: vec!["1.1.1.1".parse().unwrap()],
                next: Some("1.1".parse().unwrap()),
                commit_id: Some(Sym(b"c1".to_vec())),
            },
        );
        b.delta_text.insert(
            new_rev,
            DeltaText { log: cvsync_rcs::types::VString(b"added a line".to_vec()), text: cvsync_rcs::types::VString(b"newer".to_vec()) },
        );

        let d = diff(&a, &b, HashAlgorithm::Md5);
        let decoded = decode(&encode(&d)).unwrap();
        assert_eq!(decoded, d);
    }
}
