/// Config- and trace-file round trips through real files on disk.
pub mod config_trace_roundtrip;

/// Arbitration tests that isolate the IMC from real downstream media.
pub mod imc_arbitration;

/// Bit-alignment and coverage properties of the DRAM address functions.
pub mod mapping_properties;

/// End-to-end RMW write-combining/patching/eviction scenarios driven through
/// the full component tree.
pub mod rmw_trace_scenarios;
