//! Re-serializes a parsed [`types::File`] back into RCS `,v` text.
//!
//! Used by the updater when a fixup rewrites a revision's admin block or
//! splices in a repaired deltatext; the goal is a byte-for-byte faithful
//! encoding of the same grammar [`crate::parser`] consumes, not a
//! byte-for-byte match of whatever the original file happened to look like
//! (whitespace is normalized).

use std::time::SystemTime;

use crate::num::Num;
use crate::types::{self, VString};

pub fn write_file(file: &types::File) -> Vec<u8> {
    let mut out = Vec::new();
    write_admin(&mut out, &file.admin);

    let mut revisions: Vec<&Num> = file.delta.keys().collect();
    revisions.sort();
    for rev in &revisions {
        write_delta(&mut out, rev, &file.delta[rev]);
    }

    out.extend_from_slice(b"\n\ndesc\n");
    write_string(&mut out, &file.desc);
    out.push(b'\n');

    for rev in &revisions {
        if let Some(text) = file.delta_text.get(*rev) {
            write_delta_text(&mut out, rev, text);
        }
    }
    out
}

fn write_admin(out: &mut Vec<u8>, admin: &types::Admin) {
    out.extend_from_slice(b"head");
    if let Some(head) = &admin.head {
        out.push(b' ');
        out.extend_from_slice(head.to_string().as_bytes());
    }
    out.extend_from_slice(b";\n");

    if let Some(branch) = &admin.branch {
        out.extend_from_slice(b"branch\t");
        out.extend_from_slice(branch.to_string().as_bytes());
        out.extend_from_slice(b";\n");
    }

    out.extend_from_slice(b"access");
    for id in &admin.access {
        out.push(b'\t');
        out.extend_from_slice(&id.0);
    }
    out.extend_from_slice(b";\n");

    out.extend_from_slice(b"symbols\n");
    let mut symbols: Vec<(&types::Sym, &Num)> = admin.symbols.iter().collect();
    symbols.sort_by(|a, b| a.1.cmp(b.1));
    for (sym, num) in symbols {
        out.push(b'\t');
        out.extend_from_slice(&sym.0);
        out.push(b':');
        out.extend_from_slice(num.to_string().as_bytes());
        out.push(b'\n');
    }
    out.extend_from_slice(b";\n");

    out.extend_from_slice(b"locks");
    for (id, num) in &admin.locks {
        out.push(b'\t');
        out.extend_from_slice(&id.0);
        out.push(b':');
        out.extend_from_slice(num.to_string().as_bytes());
    }
    out.extend_from_slice(b"; ");
    if admin.strict {
        out.extend_from_slice(b"strict;");
    }
    out.push(b'\n');

    if let Some(integrity) = &admin.integrity {
        out.extend_from_slice(b"integrity\t");
        write_string(out, &VString(integrity.0.clone()));
        out.extend_from_slice(b";\n");
    }
    if let Some(comment) = &admin.comment {
        out.extend_from_slice(b"comment\t");
        write_string(out, comment);
        out.extend_from_slice(b";\n");
    }
    if let Some(expand) = &admin.expand {
        out.extend_from_slice(b"expand\t");
        write_string(out, expand);
        out.extend_from_slice(b";\n");
    }
}

fn write_delta(out: &mut Vec<u8>, num: &Num, delta: &types::Delta) {
    out.push(b'\n');
    out.extend_from_slice(num.to_string().as_bytes());
    out.extend_from_slice(b"\ndate\t");
    out.extend_from_slice(format_date(delta.date).as_bytes());
    out.extend_from_slice(b";\tauthor ");
    out.extend_from_slice(&delta.author.0);
    out.extend_from_slice(b";\tstate");
    if let Some(state) = &delta.state {
        out.push(b' ');
        out.extend_from_slice(&state.0);
    }
    out.extend_from_slice(b";\nbranches");
    for b in &delta.branches {
        out.push(b'\t');
        out.extend_from_slice(b.to_string().as_bytes());
    }
    out.extend_from_slice(b";\nnext");
    if let Some(next) = &delta.next {
        out.push(b' ');
        out.extend_from_slice(next.to_string().as_bytes());
    }
    out.extend_from_slice(b";\n");
    if let Some(commit_id) = &delta.commit_id {
        out.extend_from_slice(b"commitid\t");
        out.extend_from_slice(&commit_id.0);
        out.extend_from_slice(b";\n");
    }
}

fn write_delta_text(out: &mut Vec<u8>, num: &Num, text: &types::DeltaText) {
    out.push(b'\n');
    out.extend_from_slice(num.to_string().as_bytes());
    out.extend_from_slice(b"\nlog\n");
    write_string(out, &text.log);
    out.extend_from_slice(b"\ntext\n");
    write_string(out, &text.text);
    out.push(b'\n');
}

fn write_string(out: &mut Vec<u8>, s: &VString) {
    out.push(b'@');
    for &b in &s.0 {
        if b == b'@' {
            out.push(b'@');
        }
        out.push(b);
    }
    out.push(b'@');
}

fn format_date(when: SystemTime) -> String {
    let secs = when
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let (y, mo, d, h, mi, s) = civil_from_unix(secs);
    format!("{y}.{mo:02}.{d:02}.{h:02}.{mi:02}.{s:02}")
}

/// Inverse of `parser::days_from_civil`, again Howard Hinnant's algorithm.
fn civil_from_unix(secs: i64) -> (i64, i64, i64, i64, i64, i64) {
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (h, mi, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d, h, mi, s)
}
