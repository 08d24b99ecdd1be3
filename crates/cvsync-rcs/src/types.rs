//! Parsed representation of an RCS `,v` file: the admin header, one delta
//! per revision, the file description, and one deltatext block per
//! revision holding the log message and diff/literal text.

use std::collections::HashMap;
use std::ops::Deref;
use std::time::SystemTime;

use crate::num::Num;

macro_rules! byte_string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub Vec<u8>);

        impl Deref for $name {
            type Target = [u8];
            fn deref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(v: Vec<u8>) -> Self {
                Self(v)
            }
        }
    };
}

byte_string_newtype!(Id);
byte_string_newtype!(Sym);
byte_string_newtype!(VString);
byte_string_newtype!(IntString);

pub type Desc = VString;

#[derive(Debug, Clone, PartialEq)]
pub struct Admin {
    pub head: Option<Num>,
    pub branch: Option<Num>,
    pub access: Vec<Id>,
    pub symbols: HashMap<Sym, Num>,
    pub locks: HashMap<Id, Num>,
    pub strict: bool,
    pub integrity: Option<IntString>,
    pub comment: Option<VString>,
    pub expand: Option<VString>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub date: SystemTime,
    pub author: Id,
    pub state: Option<Id>,
    pub branches: Vec<Num>,
    pub next: Option<Num>,
    pub commit_id: Option<Sym>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaText {
    pub log: VString,
    pub text: VString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub admin: Admin,
    pub delta: HashMap<Num, Delta>,
    pub desc: Desc,
    pub delta_text: HashMap<Num, DeltaText>,
}

impl File {
    #[must_use]
    pub fn head(&self) -> Option<&Num> {
        self.admin.head.as_ref()
    }

    #[must_use]
    pub fn head_delta(&self) -> Option<(&Num, &Delta)> {
        let head = self.admin.head.as_ref()?;
        self.delta.get(head).map(|delta| (head, delta))
    }

    #[must_use]
    pub fn revision(&self, revision: &Num) -> Option<(&Delta, &DeltaText)> {
        let delta = self.delta.get(revision)?;
        let delta_text = self.delta_text.get(revision)?;
        Some((delta, delta_text))
    }

    /// Revisions reachable by walking `next` pointers from the head, i.e.
    /// the main trunk line of development.
    #[must_use]
    pub fn trunk(&self) -> Vec<&Num> {
        let mut out = Vec::new();
        let mut cursor = self.admin.head.as_ref();
        while let Some(num) = cursor {
            out.push(num);
            cursor = self.delta.get(num).and_then(|d| d.next.as_ref());
        }
        out
    }
}
