//! Watch Fabric (C6, `spec.md` §4.5): maps Secret/ServiceAccount events into
//! the binding(s) they should trigger a reconcile for.
//!
//! `kube-runtime`'s `Controller::watches` gives each mapper the changed
//! object directly rather than a separate field index, so the indexes in
//! §4.5 are realized as pure functions over that object (Secret → one
//! binding name) or over the reflector `Store` the controller already
//! maintains for the primary resource (ServiceAccount → every binding
//! targeting it).

mod mappers;

pub use mappers::{map_secret_to_binding, map_service_account_to_bindings};
