//! cib.xml — the cluster information base.
//!
//! The document is read into a small element tree and walked directly,
//! mirroring the nested primitive/group/clone/multi-state hierarchy plus the
//! per-node status section. Malformed or absent XML yields no resource tree
//! rather than an error.
//!
//! Attachment rule: when the comparison summary says cib.xml is in sync
//! across nodes, the configuration and resource history attach to the
//! cluster-wide model once; otherwise they attach to each node individually.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::domain::cluster_state::{
    CibClone, CibConfig, CibGroup, CibPrimitive, ClusterState, LrmOp, LrmResource,
};

const FILENAME: &str = "cib.xml";

// ── Minimal element tree ───────────────────────────────────

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn first<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children_named(name).next()
    }

    /// All descendants with the given tag name, in document order.
    fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.find_all(name, out);
        }
    }

    fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.find_all(name, &mut out);
        out
    }

    /// Name/value pairs of the direct nvpair children.
    fn nvpairs(&self) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();
        for nv in self.children_named("nvpair") {
            if let (Some(name), Some(value)) = (nv.attr("name"), nv.attr("value")) {
                pairs.insert(name.to_string(), value.to_string());
            }
        }
        pairs
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> Element {
    let mut attrs = BTreeMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Ok(value) = attr.unescape_value() {
            attrs.insert(key, value.into_owned());
        }
    }
    Element {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attrs,
        children: Vec::new(),
    }
}

fn build_tree(xml: &str) -> Option<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = vec![Element::default()];
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e)),
            Ok(Event::Empty(e)) => {
                let element = element_from_start(&e);
                stack.last_mut()?.children.push(element);
            }
            Ok(Event::End(_)) => {
                let element = stack.pop()?;
                stack.last_mut()?.children.push(element);
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    let mut root = stack.pop()?;
    if !stack.is_empty() || root.children.len() != 1 {
        return None;
    }
    Some(root.children.remove(0))
}

// ── Configuration walk ─────────────────────────────────────

fn read_primitive(element: &Element) -> CibPrimitive {
    let mut primitive = CibPrimitive::default();
    for (key, value) in &element.attrs {
        if key != "id" {
            primitive.attributes.insert(key.clone(), value.clone());
        }
    }
    if let Some(instance_attrs) = element.first("instance_attributes") {
        primitive.params = instance_attrs.nvpairs();
    }
    if let Some(operations) = element.first("operations") {
        for op in operations.children_named("op") {
            if let Some(name) = op.attr("name") {
                primitive
                    .operations
                    .insert(name.to_string(), op.attrs.clone());
            }
        }
    }
    primitive
}

fn read_primitives(parent: &Element) -> BTreeMap<String, CibPrimitive> {
    let mut primitives = BTreeMap::new();
    for element in parent.children_named("primitive") {
        if let Some(id) = element.attr("id") {
            primitives.insert(id.to_string(), read_primitive(element));
        }
    }
    primitives
}

fn read_meta(parent: &Element) -> BTreeMap<String, String> {
    parent
        .first("meta_attributes")
        .map(Element::nvpairs)
        .unwrap_or_default()
}

fn read_config(cib: &Element) -> CibConfig {
    let mut cfg = CibConfig {
        attributes: cib.attrs.clone(),
        ..CibConfig::default()
    };

    let Some(configuration) = cib.first("configuration") else {
        return cfg;
    };

    if let Some(crm_config) = configuration.first("crm_config") {
        for property_set in crm_config.children_named("cluster_property_set") {
            if let Some(id) = property_set.attr("id") {
                cfg.cluster_properties
                    .insert(id.to_string(), property_set.nvpairs());
            }
        }
    }

    if let Some(nodes) = configuration.first("nodes") {
        for node in nodes.children_named("node") {
            if let Some(uname) = node.attr("uname") {
                debug!(node = uname, "cib configured node");
                let attrs = node
                    .first("instance_attributes")
                    .map(Element::nvpairs)
                    .unwrap_or_default();
                cfg.node_attributes.insert(uname.to_string(), attrs);
            }
        }
    }

    if let Some(resources) = configuration.first("resources") {
        cfg.resources.primitives = read_primitives(resources);

        for group in resources.children_named("group") {
            let Some(id) = group.attr("id") else { continue };
            let mut cib_group = CibGroup {
                meta: read_meta(group),
                primitives: read_primitives(group),
                ..CibGroup::default()
            };
            for (key, value) in &group.attrs {
                if key != "id" {
                    cib_group.attributes.insert(key.clone(), value.clone());
                }
            }
            cfg.resources.groups.insert(id.to_string(), cib_group);
        }

        for (tag, out) in [
            ("clone", &mut cfg.resources.clones),
            ("master", &mut cfg.resources.masters),
        ] {
            for element in resources.children_named(tag) {
                if let Some(id) = element.attr("id") {
                    out.insert(
                        id.to_string(),
                        CibClone {
                            meta: read_meta(element),
                            primitives: read_primitives(element),
                        },
                    );
                }
            }
        }
    }

    if let Some(constraints) = configuration.first("constraints") {
        for colocation in constraints.children_named("rsc_colocation") {
            if let Some(id) = colocation.attr("id") {
                cfg.constraints
                    .colocations
                    .insert(id.to_string(), colocation.attrs.clone());
            }
        }
    }

    if let Some(meta) = configuration
        .first("rsc_defaults")
        .and_then(|d| d.first("meta_attributes"))
    {
        if let Some(id) = meta.attr("id") {
            cfg.rsc_defaults.insert(id.to_string(), meta.nvpairs());
        }
    }
    if let Some(meta) = configuration
        .first("op_defaults")
        .and_then(|d| d.first("meta_attributes"))
    {
        if let Some(id) = meta.attr("id") {
            cfg.op_defaults.insert(id.to_string(), meta.nvpairs());
        }
    }

    cfg
}

// ── Status walk ────────────────────────────────────────────

fn read_lrm_resources(node_state: &Element) -> BTreeMap<String, LrmResource> {
    let mut resources = BTreeMap::new();
    for lrm in node_state.descendants("lrm_resource") {
        let Some(id) = lrm.attr("id") else { continue };
        let mut resource = LrmResource {
            class: lrm.attr("class").unwrap_or_default().to_string(),
            rtype: lrm.attr("type").unwrap_or_default().to_string(),
            ..LrmResource::default()
        };
        for op in lrm.children_named("lrm_rsc_op") {
            if let Some(name) = op.attr("operation") {
                resource.operations.insert(
                    name.to_string(),
                    LrmOp {
                        on_node: op.attr("on_node").unwrap_or_default().to_string(),
                        rc_code: op.attr("rc-code").unwrap_or_default().to_string(),
                    },
                );
            }
        }
        resources.insert(id.to_string(), resource);
    }
    resources
}

fn transient_attr_sets(node_state: &Element) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut sets = BTreeMap::new();
    for transient in node_state.children_named("transient_attributes") {
        for instance_attrs in transient.children_named("instance_attributes") {
            let id = instance_attrs.attr("id").unwrap_or_default();
            let key = id.split('-').nth(1).unwrap_or(id).to_string();
            sets.insert(key, instance_attrs.nvpairs());
        }
    }
    sets
}

// ── Entry point ────────────────────────────────────────────

pub fn parse(dir: &Path, node_name: &str, state: &mut ClusterState) -> bool {
    let path = dir.join(FILENAME);
    let xml = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            debug!(node = node_name, path = %path.display(), error = %err, "cib.xml missing");
            return false;
        }
    };
    let Some(root) = build_tree(&xml) else {
        debug!(node = node_name, path = %path.display(), "cib.xml malformed");
        return false;
    };
    if root.name != "cib" {
        debug!(node = node_name, path = %path.display(), "unexpected root element");
        return false;
    }
    debug!(node = node_name, path = %path.display(), "parsing cluster information base");

    let cfg = read_config(&root);
    let in_sync = state.insync.cib_xml;

    if in_sync {
        if state.cib.is_none() {
            state.cib = Some(cfg);
        }
    } else {
        state.node(node_name).cib = Some(cfg);
    }

    if let Some(status) = root.first("status") {
        for node_state in status.children_named("node_state") {
            let Some(uname) = node_state.attr("uname") else {
                continue;
            };
            let resources = read_lrm_resources(node_state);
            let facts = state.node(uname);
            facts.cib_state = node_state.attrs.clone();
            facts.cib_node_attrs = transient_attr_sets(node_state);

            if in_sync {
                if state.resources.is_none() {
                    state.resources = Some(resources);
                }
            } else {
                state.node(uname).cib_resources = Some(resources);
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CIB: &str = r#"<cib crm_feature_set="3.15.0" have-quorum="1" dc-uuid="1">
  <configuration>
    <crm_config>
      <cluster_property_set id="cib-bootstrap-options">
        <nvpair id="opt-stonith" name="stonith-enabled" value="true"/>
        <nvpair id="opt-name" name="cluster-name" value="hacluster"/>
      </cluster_property_set>
    </crm_config>
    <nodes>
      <node id="1" uname="alpha">
        <instance_attributes id="nodes-1">
          <nvpair id="nodes-1-standby" name="standby" value="off"/>
        </instance_attributes>
      </node>
      <node id="2" uname="beta"/>
    </nodes>
    <resources>
      <primitive id="stonith-sbd" class="stonith" type="external/sbd">
        <instance_attributes id="sbd-ia">
          <nvpair id="sbd-ia-pcmk" name="pcmk_delay_max" value="30s"/>
        </instance_attributes>
        <operations>
          <op id="sbd-monitor" name="monitor" interval="15s"/>
        </operations>
      </primitive>
      <group id="grp-ip">
        <primitive id="vip" class="ocf" provider="heartbeat" type="IPaddr2">
          <instance_attributes id="vip-ia">
            <nvpair id="vip-ia-ip" name="ip" value="192.168.1.10"/>
          </instance_attributes>
          <operations>
            <op id="vip-monitor" name="monitor" interval="10s"/>
          </operations>
        </primitive>
      </group>
      <clone id="cln-dlm">
        <meta_attributes id="cln-dlm-meta">
          <nvpair id="cln-dlm-meta-i" name="interleave" value="true"/>
        </meta_attributes>
        <primitive id="dlm" class="ocf" provider="pacemaker" type="controld"/>
      </clone>
      <master id="ms-drbd">
        <meta_attributes id="ms-drbd-meta">
          <nvpair id="ms-drbd-meta-max" name="master-max" value="1"/>
        </meta_attributes>
        <primitive id="drbd" class="ocf" provider="linbit" type="drbd"/>
      </master>
    </resources>
    <constraints>
      <rsc_colocation id="col-vip-drbd" rsc="vip" with-rsc="ms-drbd" score="INFINITY"/>
    </constraints>
    <rsc_defaults>
      <meta_attributes id="rsc-options">
        <nvpair id="rsc-options-stickiness" name="resource-stickiness" value="100"/>
      </meta_attributes>
    </rsc_defaults>
    <op_defaults>
      <meta_attributes id="op-options">
        <nvpair id="op-options-timeout" name="timeout" value="600"/>
      </meta_attributes>
    </op_defaults>
  </configuration>
  <status>
    <node_state id="1" uname="alpha" crmd="online" join="member">
      <transient_attributes id="1">
        <instance_attributes id="status-1">
          <nvpair id="status-1-probes" name="probe_complete" value="true"/>
        </instance_attributes>
      </transient_attributes>
      <lrm id="1">
        <lrm_resources>
          <lrm_resource id="stonith-sbd" type="external/sbd" class="stonith">
            <lrm_rsc_op id="sbd-op" operation="start" on_node="alpha" rc-code="0"/>
          </lrm_resource>
        </lrm_resources>
      </lrm>
    </node_state>
  </status>
</cib>
"#;

    fn write_cib(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cib.xml"), content).unwrap();
        dir
    }

    #[test]
    fn in_sync_cib_attaches_cluster_wide() {
        let dir = write_cib(CIB);
        let mut state = ClusterState::default();
        state.insync.cib_xml = true;

        assert!(parse(dir.path(), "alpha", &mut state));

        let cfg = state.cib.as_ref().unwrap();
        assert_eq!(cfg.attributes["crm_feature_set"], "3.15.0");
        assert_eq!(
            cfg.cluster_properties["cib-bootstrap-options"]["stonith-enabled"],
            "true"
        );
        assert_eq!(cfg.node_attributes["alpha"]["standby"], "off");
        assert!(cfg.node_attributes.contains_key("beta"));

        let sbd = &cfg.resources.primitives["stonith-sbd"];
        assert_eq!(sbd.attributes["class"], "stonith");
        assert_eq!(sbd.params["pcmk_delay_max"], "30s");
        assert_eq!(sbd.operations["monitor"]["interval"], "15s");

        let vip = &cfg.resources.groups["grp-ip"].primitives["vip"];
        assert_eq!(vip.params["ip"], "192.168.1.10");
        assert_eq!(cfg.resources.clones["cln-dlm"].meta["interleave"], "true");
        assert_eq!(cfg.resources.masters["ms-drbd"].meta["master-max"], "1");
        assert_eq!(
            cfg.constraints.colocations["col-vip-drbd"]["score"],
            "INFINITY"
        );
        assert_eq!(
            cfg.rsc_defaults["rsc-options"]["resource-stickiness"],
            "100"
        );
        assert_eq!(cfg.op_defaults["op-options"]["timeout"], "600");

        // In-sync: resource history attaches cluster-wide, not per node.
        let resources = state.resources.as_ref().unwrap();
        assert_eq!(resources["stonith-sbd"].operations["start"].rc_code, "0");
        assert!(state.nodes["alpha"].cib_resources.is_none());
        assert!(state.nodes["alpha"].cib.is_none());
        assert_eq!(state.nodes["alpha"].cib_state["crmd"], "online");
        assert_eq!(state.nodes["alpha"].cib_node_attrs["1"]["probe_complete"], "true");
    }

    #[test]
    fn out_of_sync_cib_attaches_per_node() {
        let dir = write_cib(CIB);
        let mut state = ClusterState::default();
        state.insync.cib_xml = false;

        assert!(parse(dir.path(), "alpha", &mut state));

        assert!(state.cib.is_none());
        assert!(state.resources.is_none());
        assert!(state.nodes["alpha"].cib.is_some());
        let resources = state.nodes["alpha"].cib_resources.as_ref().unwrap();
        assert_eq!(resources["stonith-sbd"].class, "stonith");
    }

    #[test]
    fn element_tree_lookups_follow_the_document() {
        let root = build_tree(
            "<cib><configuration><nodes><node uname=\"alpha\"/></nodes></configuration></cib>",
        )
        .unwrap();
        let nodes = root
            .first("configuration")
            .and_then(|c| c.first("nodes"))
            .unwrap();
        assert_eq!(nodes.children_named("node").count(), 1);
        assert_eq!(root.descendants("node")[0].attr("uname"), Some("alpha"));
        assert!(root.first("status").is_none());
    }

    #[test]
    fn malformed_xml_is_not_fatal() {
        let dir = write_cib("<cib><configuration></cib>");
        let mut state = ClusterState::default();
        assert!(!parse(dir.path(), "alpha", &mut state));
        assert!(state.cib.is_none());
    }
}
