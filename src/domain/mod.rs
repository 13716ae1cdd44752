//! Domain layer: corridor catalog, rate snapshots, pricing settings, the
//! transaction draft state machine, and the ports to external collaborators.

pub mod amount;
pub mod beneficiary;
pub mod corridor;
pub mod draft;
pub mod ports;
pub mod rates;
pub mod remittance;
pub mod settings;
