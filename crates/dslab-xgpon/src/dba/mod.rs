//! OLT upstream dynamic bandwidth assignment.

pub mod bursts;
pub mod ebu;
pub mod engine;
pub mod giant;
pub mod per_burst_info;
pub mod round_robin;
pub mod rounds;
pub mod xgiant;
pub mod xgiant_deficit;
pub mod xgiant_prop;

pub use bursts::{OltDbaBursts, MAX_TCONT_PER_ONU};
pub use ebu::Ebu;
pub use engine::{allocation_words_from_rate, configure_tcont, DbaCycle, DbaEngine, OltDbaEngine, MAX_TCONT_PER_BWMAP};
pub use giant::Giant;
pub use per_burst_info::{OltDbaPerBurstInfo, TcontOltRef, MAX_TCONT_PER_BURST};
pub use round_robin::RoundRobin;
pub use xgiant::{BestEffortShare, Xgiant};
pub use xgiant_deficit::{DeficitShare, XgiantDeficit};
pub use xgiant_prop::{ProportionalShare, XgiantProp};

/// Names accepted by [`default_dba_engine_resolver`].
pub const DBA_ENGINE_NAMES: [&str; 5] = ["xgiant-prop", "xgiant-deficit", "giant", "ebu", "round-robin"];

/// Creates the DBA engine named `s`, `None` for an unknown name.
pub fn default_dba_engine_resolver(s: &str, minimum_si: u16) -> Option<Box<dyn DbaEngine>> {
    match s {
        "xgiant-prop" | "XgiantProp" => Some(Box::new(XgiantProp::new(minimum_si))),
        "xgiant-deficit" | "XgiantDeficit" => Some(Box::new(XgiantDeficit::new(minimum_si))),
        "giant" | "Giant" => Some(Box::new(Giant::new())),
        "ebu" | "Ebu" => Some(Box::new(Ebu::new(minimum_si))),
        "round-robin" | "RoundRobin" => Some(Box::new(RoundRobin::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_resolves() {
        for name in DBA_ENGINE_NAMES {
            let engine = default_dba_engine_resolver(name, 1).unwrap();
            assert_eq!(engine.to_string(), name);
        }
        assert!(default_dba_engine_resolver("fifo", 1).is_none());
    }
}
