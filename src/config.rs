use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{ExportFormat, ExportOptions};
use crate::math::{Axis, AxisConversion, AxisError, AxisFrame};
use crate::pipeline::{DuplicateOptions, MaterialOptions};
use crate::scene_graph::Scene;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid job file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Axis(#[from] AxisError),

    #[error("{0}")]
    Invalid(String),
}

/// Export settings of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupExportConfig {
    pub group: String,
    pub enable_export: bool,
    /// One file per anchor instead of one per mesh.
    pub merge_children: bool,
    /// Every anchor of the group in a single file named after the group.
    pub join_anchors: bool,
    /// Direct meshes into `<group>_main`, each subgroup into its own file.
    pub subgroups_as_single: bool,
    pub apply_deformers_before_merge: bool,
    pub visible_modifiers_only: bool,
    pub center_on_anchor: bool,
    pub output_directory: PathBuf,
    pub output_format: ExportFormat,
    pub axis_forward: Axis,
    pub axis_up: Axis,
    pub global_scale: f64,
    pub material_override: Option<String>,
    pub assign_if_no_material: bool,
    pub material_prefix: Option<String>,
}

impl Default for GroupExportConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            enable_export: true,
            merge_children: false,
            join_anchors: false,
            subgroups_as_single: false,
            apply_deformers_before_merge: false,
            visible_modifiers_only: false,
            center_on_anchor: true,
            output_directory: PathBuf::from("."),
            output_format: ExportFormat::default(),
            axis_forward: Axis::NegZ,
            axis_up: Axis::PosY,
            global_scale: 1.0,
            material_override: None,
            assign_if_no_material: false,
            material_prefix: None,
        }
    }
}

impl GroupExportConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    pub fn target_axes(&self) -> Result<AxisFrame, AxisError> {
        AxisFrame::new(self.axis_forward, self.axis_up)
    }

    pub fn export_options(&self, scene_axes: AxisFrame) -> Result<ExportOptions, AxisError> {
        Ok(ExportOptions {
            axis: AxisConversion::new(scene_axes, self.target_axes()?)?,
            global_scale: self.global_scale,
            center_on_origin: self.center_on_anchor,
        })
    }

    pub fn duplicate_options(&self) -> DuplicateOptions {
        DuplicateOptions {
            apply_modifiers: self.apply_deformers_before_merge,
            visible_modifiers_only: self.visible_modifiers_only,
            materials: MaterialOptions {
                override_material: self.material_override.clone(),
                assign_if_no_material: self.assign_if_no_material,
                prefix: self.material_prefix.clone(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group.trim().is_empty() {
            return Err(ConfigError::Invalid("export entry without a group name".to_string()));
        }
        if !self.global_scale.is_finite() || self.global_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "group `{}`: global_scale must be positive, got {}",
                self.group, self.global_scale
            )));
        }
        if self.join_anchors && !self.merge_children && !self.subgroups_as_single {
            log::warn!(
                "group `{}`: join_anchors has no effect without merge_children",
                self.group
            );
        }
        self.target_axes()?;
        Ok(())
    }
}

/// Group membership declared in the job file, by node and group names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupDefinition {
    pub name: String,
    pub members: Vec<String>,
    pub subgroups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Convention the scene is authored in; every export converts from it.
    pub scene_axes: AxisFrame,
    pub groups: Vec<GroupDefinition>,
    pub exports: Vec<GroupExportConfig>,
}

impl JobConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let job: JobConfig = serde_json::from_str(json)?;
        job.validate()?;
        Ok(job)
    }

    /// Reads a job file. Relative output directories are taken relative to
    /// the file itself.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut job = Self::from_json(&json)?;
        if let Some(base) = path.parent() {
            for export in &mut job.exports {
                if export.output_directory.is_relative() {
                    export.output_directory = base.join(&export.output_directory);
                }
            }
        }

        Ok(job)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scene_axes.validate()?;
        for export in &self.exports {
            export.validate()?;
        }
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(ConfigError::Invalid("group definition without a name".to_string()));
            }
        }
        Ok(())
    }

    /// Adds the declared memberships to `scene`, creating groups on demand.
    /// Returns a warning for every member name that matched nothing or more
    /// than one node.
    pub fn apply_groups(&self, scene: &mut Scene) -> Vec<String> {
        let mut warnings = Vec::new();

        for definition in &self.groups {
            let group = scene.ensure_group(&definition.name);

            for member in &definition.members {
                let matches = scene.objects_by_name(member);
                match matches.len() {
                    0 => warnings.push(format!(
                        "group `{}`: no node called `{}`",
                        definition.name, member
                    )),
                    1 => {}
                    n => warnings.push(format!(
                        "group `{}`: `{}` is ambiguous, adding all {} nodes",
                        definition.name, member, n
                    )),
                }
                for id in matches {
                    scene.add_to_group(group, id);
                }
            }

            for subgroup in &definition.subgroups {
                let subgroup = scene.ensure_group(subgroup);
                scene.add_subgroup(group, subgroup);
            }
        }

        for warning in &warnings {
            log::warn!("{}", warning);
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::Node;

    #[test]
    fn defaults_fill_missing_fields() {
        let job = JobConfig::from_json(r#"{"exports": [{"group": "Props"}]}"#).unwrap();
        let export = &job.exports[0];

        assert!(export.enable_export);
        assert!(export.center_on_anchor);
        assert!(!export.merge_children);
        assert_eq!(export.output_format, ExportFormat::Glb);
        assert_eq!(export.axis_forward, Axis::NegZ);
        assert_eq!(export.axis_up, Axis::PosY);
        assert_eq!(export.global_scale, 1.0);
        assert_eq!(job.scene_axes, AxisFrame::default());
    }

    #[test]
    fn parses_full_job() {
        let job = JobConfig::from_json(
            r#"{
                "scene_axes": { "forward": "-Y", "up": "Z" },
                "groups": [ { "name": "Props", "members": ["Crate"], "subgroups": ["Small"] } ],
                "exports": [ {
                    "group": "Props",
                    "output_directory": "out",
                    "output_format": "obj",
                    "merge_children": true,
                    "subgroups_as_single": true,
                    "axis_forward": "X",
                    "axis_up": "-Z",
                    "material_prefix": "M_"
                } ]
            }"#,
        )
        .unwrap();

        assert_eq!(job.scene_axes.forward, Axis::NegY);
        assert_eq!(job.groups[0].subgroups, vec!["Small".to_string()]);
        let export = &job.exports[0];
        assert_eq!(export.output_format, ExportFormat::Obj);
        assert_eq!(export.axis_up, Axis::NegZ);
        assert!(export.subgroups_as_single);
        assert_eq!(
            export.duplicate_options().materials.prefix.as_deref(),
            Some("M_")
        );
    }

    #[test]
    fn rejects_degenerate_axes_and_scale() {
        let colinear = r#"{"exports": [{"group": "A", "axis_forward": "Y", "axis_up": "-Y"}]}"#;
        assert!(matches!(JobConfig::from_json(colinear), Err(ConfigError::Axis(_))));

        let scale = r#"{"exports": [{"group": "A", "global_scale": 0.0}]}"#;
        assert!(matches!(JobConfig::from_json(scale), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            JobConfig::from_json(r#"{"exports": [{"output_format": "fbx"}]}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_resolves_output_relative_to_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"exports": [{"group": "A", "output_directory": "out"}]}"#).unwrap();

        let job = JobConfig::load(&path).unwrap();
        assert_eq!(job.exports[0].output_directory, dir.path().join("out"));

        assert!(matches!(
            JobConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn apply_groups_resolves_names() {
        let mut scene = Scene::new();
        let first = scene.add_object(Node::new("Crate"));
        let second = scene.add_object(Node::new("Crate"));
        let job = JobConfig {
            groups: vec![GroupDefinition {
                name: "Props".to_string(),
                members: vec!["Crate".to_string(), "Ghost".to_string()],
                subgroups: vec!["Small".to_string()],
            }],
            ..Default::default()
        };

        let warnings = job.apply_groups(&mut scene);

        assert_eq!(warnings.len(), 2);
        let props = scene.get_group_by_name("Props").unwrap();
        let small = scene.get_group_by_name("Small").unwrap();
        let group = scene.get_group(props).unwrap();
        assert_eq!(group.members, vec![first, second]);
        assert_eq!(group.subgroups, vec![small]);
    }
}
