//! Builds the component tree described by a config's `organization` section.
//!
//! The tree shape is fixed by convention: the root is always an [`Rmc`],
//! whose `organization` entry (`root: N*child_type`) gives its fan-out; every
//! other component type takes exactly one child (`count` is parsed but not
//! otherwise used), recursing down through `imc`, `rmw`, and `ait` until a
//! leaf (`ddr4` or `static_media`) is reached.

use crate::ait::Ait;
use crate::common::SimError;
use crate::component::Component;
use crate::config::RootConfig;
use crate::ddr4::{Ddr4Media, Geometry};
use crate::imc::Imc;
use crate::mapping::check_mapping_name;
use crate::rmc::Rmc;
use crate::rmw::Rmw;
use crate::static_media::StaticMedia;

/// Builds the full tree rooted at the `[rmc]` section and the
/// `organization`'s `root` entry.
pub fn build(config: &RootConfig) -> Result<Box<dyn Component>, SimError> {
    let (count, child_type) = config.organization("root")?;
    let section = config.section("rmc")?;
    let start_addr = section.get_u64("start_addr")?;
    let mapping_name = section.get_string_or("component_mapping_func", "none_mapping");
    check_mapping_name(&mapping_name)?;

    let mut children = Vec::with_capacity(count);
    for _ in 0..count {
        children.push(build_instance(&child_type, config)?);
    }

    Ok(Box::new(Rmc::new(start_addr, &mapping_name, children)?))
}

/// Builds a single component of `type_name`, recursing into its own child
/// (if any) via its `organization` entry.
fn build_instance(type_name: &str, config: &RootConfig) -> Result<Box<dyn Component>, SimError> {
    match type_name {
        "imc" => {
            let section = config.section("imc")?;
            let (_, child_type) = config.organization("imc")?;
            let child = build_instance(&child_type, config)?;
            Ok(Box::new(Imc::new(section, child)?))
        }
        "rmw" => {
            let section = config.section("rmw")?;
            let local = local_media(section)?;
            let (_, child_type) = config.organization("rmw")?;
            let next = build_instance(&child_type, config)?;
            Ok(Box::new(Rmw::new(section, local, next)?))
        }
        "ait" => {
            let section = config.section("ait")?;
            let local = local_media(section)?;
            let (_, child_type) = config.organization("ait")?;
            let next = build_instance(&child_type, config)?;
            Ok(Box::new(Ait::new(section, local, next)?))
        }
        "ddr4" => {
            let section = config.section("ddr4")?;
            let geometry = Geometry::from_section(section)?;
            Ok(Box::new(Ddr4Media::new(section, geometry)?))
        }
        "static_media" => {
            let section = config.section("static_media")?;
            Ok(Box::new(StaticMedia::new(
                section.get_u64("read_latency")?,
                section.get_u64("write_latency")?,
            )))
        }
        other => Err(SimError::UnknownComponentType(other.to_string())),
    }
}

/// Reads the `local_read_latency`/`local_write_latency` pair shared by RMW
/// and AIT for their own (non-`next`) backing store.
fn local_media(section: &crate::config::Section) -> Result<StaticMedia, SimError> {
    Ok(StaticMedia::new(
        section.get_u64("local_read_latency")?,
        section.get_u64("local_write_latency")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_CONFIG: &str = "\
[organization]
root: 1*imc
imc: 1*rmw
rmw: 1*ait
ait: 1*ddr4

[rmc]
start_addr: 0
component_mapping_func: none_mapping

[imc]
wpq_entries: 4
rpq_entries: 4
adr_epoch: 0

[rmw]
lsq_entries: 4
roq_entries: 4
buffer_entries: 4
ait_to_rmw_latency: 10
rmw_to_ait_latency: 10
local_read_latency: 50
local_write_latency: 50

[ait]
lsq_entries: 4
lmemq_entries: 4
buffer_entries: 4
wear_leveling_threshold: 0
migration_block_entries: 0
migration_latency: 0
local_read_latency: 5
local_write_latency: 5

[ddr4]
channel: 1
rank: 1
bank_group: 1
bank: 1
row: 1024
col: 1024
rate: 1600
freq: 800
tCK: 1.25
nBL: 4
nCCDS: 4
nCCDL: 5
nRTRS: 2
nCL: 11
nRCD: 11
nRP: 11
nCWL: 9
nRAS: 28
nRC: 39
nRTP: 6
nWTRS: 2
nWTRL: 6
nWR: 12
nRRDS: 4
nRRDL: 5
nFAW: 20
nRFC: 160
nREFI: 7800
";

    #[test]
    fn builds_the_whole_tree_from_a_minimal_config() {
        let cfg = RootConfig::parse(MINIMAL_CONFIG).unwrap();
        let tree = build(&cfg).unwrap();
        assert!(!tree.pending());
    }

    #[test]
    fn unknown_component_type_is_reported() {
        let text = MINIMAL_CONFIG.replace("ait: 1*ddr4", "ait: 1*nonsense");
        let cfg = RootConfig::parse(&text).unwrap();
        assert!(matches!(build(&cfg), Err(SimError::UnknownComponentType(name)) if name == "nonsense"));
    }
}
