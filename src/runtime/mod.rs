//! Process runtime: bootstrap, the per-version watch loop, and error
//! handling shared by both (`spec.md` §4.5, §6).

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
