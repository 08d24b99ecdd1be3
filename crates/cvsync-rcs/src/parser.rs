//! `nom` combinators for the RCS file grammar: `admin`, `delta*`, `desc`,
//! `deltatext*`, in that fixed order.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use nom::branch::permutation;
use nom::bytes::complete::{tag, take_till};
use nom::character::complete::{char, digit1, multispace0, multispace1};
use nom::combinator::{map, map_res, opt, recognize};
use nom::multi::{fold_many0, many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::error::RcsError;
use crate::num::Num;
use crate::types::{self, IntString, Id, Sym, VString};

pub fn parse_file(input: &[u8]) -> Result<types::File, RcsError> {
    match file(input) {
        Ok((rest, file)) if rest.iter().all(u8::is_ascii_whitespace) => Ok(file),
        Ok((_rest, _file)) => Err(RcsError::TrailingData),
        Err(_) => Err(RcsError::Malformed { offset: 0 }),
    }
}

fn file(input: &[u8]) -> IResult<&[u8], types::File> {
    map(
        tuple((
            delimited(multispace0, admin, multispace0),
            many0(terminated(delta, multispace0)),
            terminated(desc, multispace0),
            many0(terminated(delta_text, multispace0)),
        )),
        |(admin, delta, desc, delta_text)| types::File {
            admin,
            delta: delta.into_iter().collect(),
            desc,
            delta_text: delta_text.into_iter().collect(),
        },
    )(input)
}

fn admin(input: &[u8]) -> IResult<&[u8], types::Admin> {
    map(
        permutation((
            field(b"head", opt(num)),
            map(opt(field(b"branch", opt(num))), |b| b.flatten()),
            field(b"access", many0(preceded(multispace1, id))),
            field(
                b"symbols",
                fold_many0(
                    pair(
                        delimited(multispace0, sym, multispace0),
                        preceded(char(':'), delimited(multispace0, num, multispace0)),
                    ),
                    HashMap::new,
                    |mut acc, (k, v)| {
                        acc.insert(k, v);
                        acc
                    },
                ),
            ),
            field(
                b"locks",
                fold_many0(
                    pair(
                        delimited(multispace0, id, multispace0),
                        preceded(char(':'), delimited(multispace0, num, multispace0)),
                    ),
                    HashMap::new,
                    |mut acc, (k, v)| {
                        acc.insert(k, v);
                        acc
                    },
                ),
            ),
            map(
                opt(tuple((tag(b"strict"), multispace0, char(';'), multispace0))),
                |strict| strict.is_some(),
            ),
            opt(field(b"integrity", integrity_string)),
            opt(field(b"comment", string)),
            opt(field(b"expand", string)),
        )),
        |(head, branch, access, symbols, locks, strict, integrity, comment, expand)| {
            types::Admin {
                head,
                branch,
                access,
                symbols,
                locks,
                strict,
                integrity,
                comment,
                expand,
            }
        },
    )(input)
}

fn delta(input: &[u8]) -> IResult<&[u8], (Num, types::Delta)> {
    map(
        tuple((
            terminated(num, multispace1),
            permutation((
                field(b"date", date),
                field(b"author", id),
                field(b"state", opt(id)),
                field(b"branches", many0(preceded(multispace1, num))),
                field(b"next", opt(num)),
                opt(field(b"commitid", sym)),
            )),
        )),
        |(num, (date, author, state, branches, next, commit_id))| {
            (
                num,
                types::Delta {
                    date,
                    author,
                    state,
                    branches,
                    next,
                    commit_id,
                },
            )
        },
    )(input)
}

fn delta_text(input: &[u8]) -> IResult<&[u8], (Num, types::DeltaText)> {
    map(
        tuple((
            num,
            preceded(multispace1, tag(b"log")),
            delimited(multispace1, string, multispace1),
            tag(b"text"),
            preceded(multispace1, string),
        )),
        |(num, _, log, _, text)| (num, types::DeltaText { log, text }),
    )(input)
}

fn desc(input: &[u8]) -> IResult<&[u8], types::Desc> {
    preceded(tuple((tag(b"desc"), multispace1)), string)(input)
}

/// `keyword <body> ;`, tolerating the usual run of surrounding whitespace.
fn field<'a, O>(
    keyword: &'static [u8],
    mut body: impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], O> {
    move |input| {
        let (input, _) = tag(keyword)(input)?;
        let (input, _) = multispace0(input)?;
        let (input, out) = body(input)?;
        let (input, _) = tuple((multispace0, char(';'), multispace0))(input)?;
        Ok((input, out))
    }
}

fn num(input: &[u8]) -> IResult<&[u8], Num> {
    map_res(
        recognize(pair(digit1, many0_count(pair(char('.'), digit1)))),
        Num::try_from,
    )(input)
}

fn id(input: &[u8]) -> IResult<&[u8], Id> {
    map(
        take_till(|c: u8| c.is_ascii_whitespace() || c == b';' || c == b':'),
        |bytes: &[u8]| Id(bytes.to_vec()),
    )(input)
}

fn sym(input: &[u8]) -> IResult<&[u8], Sym> {
    map(
        take_till(|c: u8| c.is_ascii_whitespace() || c == b':' || c == b';'),
        |bytes: &[u8]| Sym(bytes.to_vec()),
    )(input)
}

fn integrity_string(input: &[u8]) -> IResult<&[u8], IntString> {
    map(string, |v: VString| IntString(v.0))(input)
}

/// RCS `@`-quoted string: begins and ends with `@`; a literal `@` inside is
/// written as `@@`.
fn string(input: &[u8]) -> IResult<&[u8], VString> {
    let (mut input, _) = char('@')(input)?;
    let mut out = Vec::new();
    loop {
        let pos = input.iter().position(|&b| b == b'@');
        let Some(pos) = pos else {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Eof,
            )));
        };
        out.extend_from_slice(&input[..pos]);
        input = &input[pos + 1..];
        match input.first() {
            Some(b'@') => {
                out.push(b'@');
                input = &input[1..];
            }
            _ => return Ok((input, VString(out))),
        }
    }
}

/// `YY.MM.DD.hh.mm.ss` or `YYYY.MM.DD.hh.mm.ss`; two-digit years are RCS's
/// pre-2000 convention and are treated as 19xx.
fn date(input: &[u8]) -> IResult<&[u8], SystemTime> {
    let (input, parts) = nom::multi::separated_list1(char('.'), digit1)(input)?;
    if parts.len() != 6 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Count,
        )));
    }
    let nums: Vec<i64> = parts
        .iter()
        .map(|p| std::str::from_utf8(p).unwrap().parse().unwrap())
        .collect();
    let mut year = nums[0];
    if year < 100 {
        year += 1900;
    }
    let (month, day, hour, min, sec) = (nums[1], nums[2], nums[3], nums[4], nums[5]);
    let days = days_from_civil(year, month, day);
    let secs = days * 86400 + hour * 3600 + min * 60 + sec;
    let epoch = SystemTime::UNIX_EPOCH;
    let when = if secs >= 0 {
        epoch + Duration::from_secs(secs as u64)
    } else {
        epoch - Duration::from_secs((-secs) as u64)
    };
    Ok((input, when))
}

/// Howard Hinnant's days-since-epoch algorithm for the proleptic Gregorian
/// calendar; avoids pulling in a full date/time crate for one field.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}
