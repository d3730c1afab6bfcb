//! The diagnostic rule catalog and its evaluation engine.
//!
//! Rules are pure predicates over the finished cluster model. Each produces
//! one finding, applicable or not, with a curated documentation link and
//! optional knowledge-base references fetched through the [`KnowledgeBase`]
//! seam. Catalog order is fixed so reports list findings deterministically.

use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::cluster_state::{ClusterState, TRACKED_PACKAGES};

const PRODUCT: &str = "SUSE Linux Enterprise High Availability Extension";

/// Upper bound on references per finding, curated links included.
const KB_RESULT_CAP: usize = 10;

/// External reference lookup. Implementations must return an empty list on
/// any failure, never an error.
pub trait KnowledgeBase {
    fn search(&self, product: &str, terms: &str, max_results: usize) -> Vec<KbEntry>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbEntry {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// One rule's verdict over the cluster model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub description: String,
    pub product: String,
    pub component: String,
    pub subcomponent: String,
    pub applicable: bool,
    pub kb_search_terms: String,
    pub kb_search_results: Vec<KbEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub time_analyzed: String,
    pub patterns_total: usize,
    pub patterns_applied: usize,
    /// Rule keys in the order they became applicable.
    pub patterns_applied_keys: Vec<String>,
    pub results: BTreeMap<String, Finding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    FencingRequired,
    SplitBrain,
    SbdUnclean,
    MaintenanceMode,
    StandbyMode,
    PermissionsInvalid,
    PackageVersionDrift,
}

pub const CATALOG: &[Rule] = &[
    Rule::FencingRequired,
    Rule::SplitBrain,
    Rule::SbdUnclean,
    Rule::MaintenanceMode,
    Rule::StandbyMode,
    Rule::PermissionsInvalid,
    Rule::PackageVersionDrift,
];

impl Rule {
    pub fn key(&self) -> &'static str {
        match self {
            Rule::FencingRequired => "fencing_required",
            Rule::SplitBrain => "split_brain",
            Rule::SbdUnclean => "sbd_unclean",
            Rule::MaintenanceMode => "maintenance_mode",
            Rule::StandbyMode => "standby_mode",
            Rule::PermissionsInvalid => "permissions_invalid",
            Rule::PackageVersionDrift => "package_version_drift",
        }
    }

    fn template(&self) -> Finding {
        let (title, description, component, subcomponent, terms) = match self {
            Rule::FencingRequired => (
                "Fencing Resource Required",
                "Missing STONITH resource required for supportability",
                "Fencing",
                "STONITH",
                "stonith resource not enabled unsupported",
            ),
            Rule::SplitBrain => (
                "Split Brain Detection",
                "Detected possible split brain cluster",
                "Fencing",
                "Split Brain",
                "troubleshooting stonith split brain",
            ),
            Rule::SbdUnclean => (
                "Verify Clean SBD",
                "SBD nodes with dirty slots: None",
                "Fencing",
                "SBD",
                "stonith sbd nodes not clear",
            ),
            Rule::MaintenanceMode => (
                "Cluster Maintenance Mode",
                "In Maintenance Mode, Cluster: False, Nodes: None",
                "Maintenance",
                "Mode",
                "cluster maintenance mode",
            ),
            Rule::StandbyMode => (
                "Cluster Standby Mode",
                "Nodes in standby mode: None",
                "Maintenance",
                "Standby",
                "cluster standby mode",
            ),
            Rule::PermissionsInvalid => (
                "File Permissions Audit",
                "Cluster file permissions valid on all audited nodes",
                "Configuration",
                "Permissions",
                "cluster file permissions ownership invalid",
            ),
            Rule::PackageVersionDrift => (
                "Package Version Consistency",
                "Package versions differ across included nodes: None",
                "Configuration",
                "Packages",
                "cluster partially upgraded mixed package versions",
            ),
        };
        Finding {
            title: title.to_string(),
            description: description.to_string(),
            product: PRODUCT.to_string(),
            component: component.to_string(),
            subcomponent: subcomponent.to_string(),
            applicable: false,
            kb_search_terms: terms.to_string(),
            kb_search_results: Vec::new(),
        }
    }

    fn curated(&self) -> KbEntry {
        let (title, url) = match self {
            Rule::FencingRequired => (
                "Hardware Requirements, Node fencing/STONITH",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-requirements.html",
            ),
            Rule::SplitBrain => (
                "Fencing and STONITH",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-fencing.html",
            ),
            Rule::SbdUnclean => (
                "Storage protection and SBD",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-storage-protect.html",
            ),
            Rule::MaintenanceMode | Rule::StandbyMode => (
                "Executing maintenance tasks",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-maintenance.html",
            ),
            Rule::PermissionsInvalid => (
                "Troubleshooting",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-troubleshooting.html",
            ),
            Rule::PackageVersionDrift => (
                "Upgrading your cluster and updating software packages",
                "https://documentation.suse.com/sle-ha/15-SP7/html/SLE-HA-all/cha-ha-migration.html",
            ),
        };
        KbEntry {
            id: "Documentation".to_string(),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    /// Applicability verdict plus a description override when applicable.
    fn evaluate(&self, state: &ClusterState) -> (bool, Option<String>) {
        match self {
            Rule::FencingRequired => (!state.stonith.enabled, None),
            Rule::SplitBrain => {
                let dc_list: Vec<&str> = state
                    .nodes
                    .iter()
                    .filter(|(_, facts)| facts.is_dc_crm || facts.is_dc_local)
                    .map(|(name, _)| name.as_str())
                    .collect();
                if dc_list.len() > 1 {
                    (
                        true,
                        Some(format!(
                            "Detected possible split brain cluster, multiple DC nodes: {}",
                            dc_list.join(" ")
                        )),
                    )
                } else {
                    (false, None)
                }
            }
            Rule::SbdUnclean => {
                if state.stonith.sbd.found && state.stonith.sbd.all_clear == 0 {
                    let dirty: Vec<&str> = state
                        .stonith
                        .sbd
                        .nodes
                        .iter()
                        .filter(|(_, node)| !node.is_clear)
                        .map(|(name, _)| name.as_str())
                        .collect();
                    (
                        true,
                        Some(format!("SBD nodes with dirty slots: {}", dirty.join(" "))),
                    )
                } else {
                    (false, None)
                }
            }
            Rule::MaintenanceMode => {
                let listed = if state.nodes_maintenance.is_empty() {
                    "None".to_string()
                } else {
                    state.nodes_maintenance.join(" ")
                };
                if state.cluster_maintenance {
                    (
                        true,
                        Some(format!("In Maintenance Mode, Cluster: True, Nodes: {listed}")),
                    )
                } else if !state.nodes_maintenance.is_empty() {
                    (
                        true,
                        Some(format!("In Maintenance Mode, Cluster: False, Nodes: {listed}")),
                    )
                } else {
                    (false, None)
                }
            }
            Rule::StandbyMode => {
                if state.nodes_standby.is_empty() {
                    (false, None)
                } else {
                    (
                        true,
                        Some(format!(
                            "Nodes in standby mode: {}",
                            state.nodes_standby.join(" ")
                        )),
                    )
                }
            }
            Rule::PermissionsInvalid => match state.permissions_valid_all_nodes {
                0 => {
                    let failing: Vec<&str> = state
                        .nodes
                        .iter()
                        .filter(|(_, facts)| facts.permissions_valid == Some(false))
                        .map(|(name, _)| name.as_str())
                        .collect();
                    (
                        true,
                        Some(format!(
                            "Invalid cluster file permissions on nodes: {}",
                            failing.join(" ")
                        )),
                    )
                }
                -1 => (
                    true,
                    Some(
                        "Cluster file permissions indeterminate, collected node count \
                         differs from configured node count"
                            .to_string(),
                    ),
                ),
                _ => (false, None),
            },
            Rule::PackageVersionDrift => {
                let mut drifted: Vec<String> = Vec::new();
                for package in TRACKED_PACKAGES {
                    let mut baseline: Option<&str> = None;
                    let mut flagged: Vec<&str> = Vec::new();
                    for (name, facts) in &state.nodes {
                        if !facts.is_included {
                            continue;
                        }
                        let Some(version) = facts
                            .sysinfo
                            .as_ref()
                            .and_then(|info| info.versions.get(*package))
                            .map(String::as_str)
                        else {
                            continue;
                        };
                        match baseline {
                            None => baseline = Some(version),
                            Some(expected) if expected != version => flagged.push(name),
                            Some(_) => {}
                        }
                    }
                    if !flagged.is_empty() {
                        drifted.push(format!("{package}: {}", flagged.join(" ")));
                    }
                }
                if drifted.is_empty() {
                    (false, None)
                } else {
                    (
                        true,
                        Some(format!(
                            "Package versions differ across included nodes: {}",
                            drifted.join(", ")
                        )),
                    )
                }
            }
        }
    }
}

pub struct PatternEngine<'a> {
    kb: Option<&'a dyn KnowledgeBase>,
}

impl<'a> PatternEngine<'a> {
    pub fn new(kb: Option<&'a dyn KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Evaluate the full catalog against the model.
    pub fn analyze(&self, state: &ClusterState) -> AnalysisReport {
        match self.kb {
            Some(_) => info!("analyzing cluster data"),
            None => info!("analyzing cluster data, reference searching disabled"),
        }

        let mut report = AnalysisReport {
            time_analyzed: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            patterns_total: CATALOG.len(),
            patterns_applied: 0,
            patterns_applied_keys: Vec::new(),
            results: BTreeMap::new(),
        };

        for rule in CATALOG {
            debug!(rule = rule.key(), "evaluating pattern");
            let mut finding = rule.template();
            let (applicable, description) = rule.evaluate(state);
            if applicable {
                finding.applicable = true;
                if let Some(description) = description {
                    finding.description = description;
                }
                finding.kb_search_results = self.gather_references(rule, &finding);
                report.patterns_applied += 1;
                report.patterns_applied_keys.push(rule.key().to_string());
            }
            report.results.insert(rule.key().to_string(), finding);
        }

        info!(
            evaluated = report.patterns_total,
            applicable = report.patterns_applied,
            "pattern evaluation finished"
        );
        report
    }

    /// Curated links first, then fetched ones up to the cap; curated entries
    /// win on id collision.
    fn gather_references(&self, rule: &Rule, finding: &Finding) -> Vec<KbEntry> {
        let mut references = vec![rule.curated()];
        if let Some(kb) = self.kb {
            let remaining = KB_RESULT_CAP - references.len();
            for entry in kb.search(&finding.product, &finding.kb_search_terms, remaining) {
                if references.len() >= KB_RESULT_CAP {
                    break;
                }
                if references.iter().any(|existing| existing.id == entry.id) {
                    continue;
                }
                references.push(entry);
            }
        }
        references
    }
}
