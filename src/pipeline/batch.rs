//! The batch entry point: resolve every enabled group into export units, then
//! run each unit through duplicate, detach, merge, relocate, write and
//! destroy, inside one session that restores the scene at the end.

use std::collections::HashSet;

use glam::DVec3;

use crate::config::GroupExportConfig;
use crate::export::{ExportOptions, Exporter};
use crate::math::AxisFrame;
use crate::pipeline::duplicate::duplicate;
use crate::pipeline::error::{PipelineError, PipelineResult, SessionError};
use crate::pipeline::merge::{merge, relocate_origin};
use crate::pipeline::naming::OutputNamer;
use crate::pipeline::reparent::detach_preserving_world;
use crate::pipeline::report::{ExportReport, ExportSubject};
use crate::pipeline::resolver::{direct_mesh_members, find_anchors, mesh_nodes, Anchor};
use crate::pipeline::session::{CancelFlag, ExportSession};
use crate::scene_graph::{GroupId, NodeId, Scene, SceneNode};

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Axis convention the scene is authored in.
    pub scene_axes: AxisFrame,
    pub cancel: Option<CancelFlag>,
}

/// One file (or, for unmerged anchors, one file per mesh) to produce.
#[derive(Debug, Clone)]
pub struct ExportUnit<'c> {
    pub config: &'c GroupExportConfig,
    pub options: ExportOptions,
    pub name: String,
    pub subject: ExportSubject,
    /// Original mesh nodes feeding the unit.
    pub sources: Vec<NodeId>,
    /// Node whose world position becomes the origin of the output.
    pub origin: Option<NodeId>,
    /// All sources go into one file.
    pub merge: bool,
}

/// Exports every enabled group. Individual failures are collected in the
/// report; only a second session or a cancellation ends the batch early.
/// The scene is restored in every case.
pub fn export_all(
    scene: &mut Scene,
    configs: &[GroupExportConfig],
    exporter: &dyn Exporter,
    options: &SessionOptions,
) -> Result<ExportReport, SessionError> {
    let mut session = ExportSession::begin(scene)?;
    let mut report = ExportReport::default();

    let units = plan_units(session.scene(), configs, options.scene_axes, &mut report);
    log::info!("Exporting {} unit(s) from {} group config(s)", units.len(), configs.len());

    let completed = run_units(
        &mut session,
        &units,
        exporter,
        options.cancel.as_ref(),
        &mut report,
    );
    collect_restore_warnings(session.finish(), &mut report);

    if !completed {
        return Err(SessionError::Cancelled { report });
    }
    log::info!(
        "Export finished: {} file(s), {} degraded, {} failure(s)",
        report.exported_count(),
        report.degraded_count(),
        report.failures.len()
    );
    Ok(report)
}

/// Resolves enabled groups into units. Anchors reached by more than one
/// group are exported by the first one only. Resolution failures go into
/// `report`.
pub fn plan_units<'c>(
    scene: &Scene,
    configs: &'c [GroupExportConfig],
    scene_axes: AxisFrame,
    report: &mut ExportReport,
) -> Vec<ExportUnit<'c>> {
    let mut units = Vec::new();
    let mut claimed_anchors = HashSet::new();

    for config in configs.iter().filter(|config| config.enable_export) {
        let subject = ExportSubject::Group(config.group.clone());

        let Some(group) = scene.get_group_by_name(&config.group) else {
            report.record_failure(
                subject,
                &config.group,
                PipelineError::resolution(&config.group, "no such group"),
            );
            continue;
        };
        let options = match config.export_options(scene_axes) {
            Ok(options) => options,
            Err(err) => {
                report.record_failure(
                    subject,
                    &config.group,
                    PipelineError::resolution(&config.group, err.to_string()),
                );
                continue;
            }
        };

        let planned = if config.subgroups_as_single {
            plan_subgroups(scene, config, group, options, &mut claimed_anchors)
        } else {
            plan_group(scene, config, group, options, &mut claimed_anchors)
        };
        match planned {
            Ok(planned) => units.extend(planned),
            Err(err) => report.record_failure(subject, &config.group, err),
        }
    }

    units
}

fn plan_group<'c>(
    scene: &Scene,
    config: &'c GroupExportConfig,
    group: GroupId,
    options: ExportOptions,
    claimed_anchors: &mut HashSet<NodeId>,
) -> PipelineResult<Vec<ExportUnit<'c>>> {
    let anchors = find_anchors(scene, group);
    if anchors.is_empty() {
        let meshes = mesh_nodes(scene, group);
        if meshes.is_empty() {
            return Err(PipelineError::resolution(
                &config.group,
                "no anchors and no mesh nodes",
            ));
        }

        log::debug!(
            "Group `{}` has no anchors, exporting {} mesh node(s) as they are",
            config.group,
            meshes.len()
        );
        if config.merge_children {
            return Ok(vec![verbatim_unit(
                config,
                options,
                config.group.clone(),
                ExportSubject::Group(config.group.clone()),
                meshes,
            )]);
        }

        return Ok(meshes
            .into_iter()
            .map(|id| ExportUnit {
                merge: false,
                ..verbatim_unit(
                    config,
                    options,
                    scene
                        .get_object(id)
                        .map(|node| node.name.clone())
                        .unwrap_or_default(),
                    ExportSubject::Node(id),
                    vec![id],
                )
            })
            .collect());
    }

    let anchors = claim_anchors(anchors, claimed_anchors, &config.group);
    if config.join_anchors && config.merge_children {
        return Ok(joined_unit(config, options, &config.group, &anchors)
            .into_iter()
            .collect());
    }

    Ok(anchors
        .into_iter()
        .map(|anchor| ExportUnit {
            config,
            options,
            name: anchor.name,
            subject: ExportSubject::Anchor(anchor.id),
            sources: anchor.meshes,
            origin: Some(anchor.id),
            merge: config.merge_children,
        })
        .collect())
}

/// `<group>_main` from the group's own meshes, then one merged file per
/// direct subgroup.
fn plan_subgroups<'c>(
    scene: &Scene,
    config: &'c GroupExportConfig,
    group: GroupId,
    options: ExportOptions,
    claimed_anchors: &mut HashSet<NodeId>,
) -> PipelineResult<Vec<ExportUnit<'c>>> {
    let mut units = Vec::new();
    let mut found_any = false;

    let main = direct_mesh_members(scene, group);
    if !main.is_empty() {
        found_any = true;
        units.push(verbatim_unit(
            config,
            options,
            format!("{}_main", config.group),
            ExportSubject::Group(config.group.clone()),
            main,
        ));
    }

    let subgroups = scene
        .get_group(group)
        .map(|group| group.subgroups.clone())
        .unwrap_or_default();
    for subgroup in subgroups {
        let Some(name) = scene.get_group(subgroup).map(|sub| sub.name.clone()) else {
            continue;
        };

        if config.join_anchors {
            let anchors = find_anchors(scene, subgroup);
            if !anchors.is_empty() {
                found_any = true;
                let anchors = claim_anchors(anchors, claimed_anchors, &name);
                units.extend(joined_unit(config, options, &name, &anchors));
                continue;
            }
        }

        let meshes = subgroup_meshes(scene, subgroup);
        if meshes.is_empty() {
            log::debug!("Subgroup `{}` of `{}` has no mesh nodes", name, config.group);
            continue;
        }
        found_any = true;
        units.push(verbatim_unit(
            config,
            options,
            name.clone(),
            ExportSubject::Group(name),
            meshes,
        ));
    }

    if !found_any {
        return Err(PipelineError::resolution(
            &config.group,
            "no direct mesh members and no subgroup with mesh nodes",
        ));
    }
    Ok(units)
}

/// Mesh members of the group tree followed by the meshes under its anchors.
fn subgroup_meshes(scene: &Scene, group: GroupId) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    mesh_nodes(scene, group)
        .into_iter()
        .chain(
            find_anchors(scene, group)
                .into_iter()
                .flat_map(|anchor| anchor.meshes),
        )
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Drops anchors an earlier group already took and claims the rest.
fn claim_anchors(
    anchors: Vec<Anchor>,
    claimed_anchors: &mut HashSet<NodeId>,
    group: &str,
) -> Vec<Anchor> {
    anchors
        .into_iter()
        .filter(|anchor| {
            let first = claimed_anchors.insert(anchor.id);
            if !first {
                log::info!(
                    "Anchor `{}` already exported by an earlier group, skipping it in `{}`",
                    anchor.name,
                    group
                );
            }
            first
        })
        .collect()
}

/// Every anchor's meshes in one file, with its origin at the first anchor.
fn joined_unit<'c>(
    config: &'c GroupExportConfig,
    options: ExportOptions,
    name: &str,
    anchors: &[Anchor],
) -> Option<ExportUnit<'c>> {
    let first = anchors.first()?;
    Some(ExportUnit {
        config,
        options,
        name: name.to_string(),
        subject: ExportSubject::Group(name.to_string()),
        sources: anchors
            .iter()
            .flat_map(|anchor| anchor.meshes.iter().copied())
            .collect(),
        origin: Some(first.id),
        merge: true,
    })
}

/// Merged export of nodes where they stand, without moving any origin.
fn verbatim_unit<'c>(
    config: &'c GroupExportConfig,
    options: ExportOptions,
    name: String,
    subject: ExportSubject,
    sources: Vec<NodeId>,
) -> ExportUnit<'c> {
    ExportUnit {
        config,
        options: ExportOptions {
            center_on_origin: false,
            ..options
        },
        name,
        subject,
        sources,
        origin: None,
        merge: true,
    }
}

/// Runs `units` in order inside `session`. Returns `false` when the batch
/// was cancelled before finishing.
fn run_units(
    session: &mut ExportSession,
    units: &[ExportUnit],
    exporter: &dyn Exporter,
    cancel: Option<&CancelFlag>,
    report: &mut ExportReport,
) -> bool {
    let captured = units
        .iter()
        .flat_map(|unit| unit.origin.into_iter().chain(unit.sources.iter().copied()))
        .collect::<Vec<_>>();
    session.capture(captured);

    let mut namer = OutputNamer::new();
    for unit in units {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            log::warn!("Export cancelled before `{}`", unit.name);
            return false;
        }

        process_unit(session, unit, exporter, &mut namer, report);
        session.destroy_ephemeral();
    }

    true
}

fn process_unit(
    session: &mut ExportSession,
    unit: &ExportUnit,
    exporter: &dyn Exporter,
    namer: &mut OutputNamer,
    report: &mut ExportReport,
) {
    log::debug!("Exporting `{}` from {} mesh node(s)", unit.name, unit.sources.len());

    let target = unit.origin.and_then(|origin| {
        session
            .scene()
            .node_ref(origin)
            .map(|anchor| anchor.get_world_transform().w_axis.truncate())
    });

    let duplication = match duplicate(
        session.scene_mut(),
        &unit.sources,
        &unit.config.duplicate_options(),
    ) {
        Ok(duplication) => duplication,
        Err(err) => {
            report.record_failure(unit.subject.clone(), &unit.name, err);
            return;
        }
    };
    session.track(duplication.nodes.iter().copied());
    for warning in duplication.warnings {
        report.warn(warning);
    }
    let Some(&first) = duplication.nodes.first() else {
        return;
    };

    for &id in &duplication.nodes {
        detach_preserving_world(session.scene_mut(), id);
    }

    let outputs = if unit.merge {
        match merge(session.scene_mut(), &duplication.nodes) {
            Ok(merged) => {
                session.track([merged]);
                vec![(merged, unit.name.clone(), false)]
            }
            Err(err) => {
                report.warn(format!(
                    "{}: {}; exporting the first mesh on its own",
                    unit.name, err
                ));
                vec![(first, unit.name.clone(), true)]
            }
        }
    } else if duplication.nodes.len() == 1 {
        vec![(first, unit.name.clone(), false)]
    } else {
        duplication
            .nodes
            .iter()
            .map(|&id| {
                let mesh_name = session
                    .scene()
                    .get_object(id)
                    .map(|node| node.name.as_str())
                    .unwrap_or_default();
                (id, format!("{}_{}", unit.name, mesh_name), false)
            })
            .collect()
    };

    for (id, name, degraded) in outputs {
        write_output(session, unit, exporter, namer, report, id, name, degraded, target);
    }
}

#[allow(clippy::too_many_arguments)]
fn write_output(
    session: &mut ExportSession,
    unit: &ExportUnit,
    exporter: &dyn Exporter,
    namer: &mut OutputNamer,
    report: &mut ExportReport,
    id: NodeId,
    name: String,
    mut degraded: bool,
    target: Option<DVec3>,
) {
    if let Some(target) = target {
        if let Err(err) = relocate_origin(session.scene_mut(), id, target) {
            report.warn(format!("{}; exporting with its current origin", err));
            degraded = true;
        }
    }

    if let Some(node) = session.scene_mut().get_object_mut(id) {
        node.name = name.clone();
    }

    let format = unit.config.output_format;
    let path = namer.claim(&unit.config.output_directory, &name, format.extension());
    session.scene_mut().select_only(&[id]);

    match exporter.write(session.scene(), &[id], format, &path, &unit.options) {
        Ok(()) => {
            log::info!("Exported `{}` to {}", name, path.display());
            report.record_file(path, unit.subject.clone(), degraded);
        }
        Err(source) => {
            report.record_failure(
                unit.subject.clone(),
                name,
                PipelineError::ExportIo { path, source },
            );
        }
    }
}

fn collect_restore_warnings(warnings: Vec<PipelineError>, report: &mut ExportReport) {
    for warning in warnings {
        report.warnings.push(warning.to_string());
    }
}
