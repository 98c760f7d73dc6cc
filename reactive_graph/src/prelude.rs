//! Glob-importable trait surface: `use reactive_graph::prelude::*;` brings every read/write
//! capability into scope without naming each trait, matching the teacher's `leptos::prelude`
//! convention.

pub use crate::traits::{
    Dispose, Get, GetUntracked, IntoInner, IsPending, OnUnobserved, Read, Refresh, Set, Track,
    Update, UpdateUntracked, With, WithUntracked, Write,
};
