use crate::foundation::raster::{BBox, Dim};

/// Skeleton template identifier baked into every rig this crate produces.
pub const TEMPLATE_ID: &str = "humanoid-18";

/// Rigging constraints consumed by limb segmentation and animation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RigConstraints {
    /// Root bone is never translated independently of the body.
    pub locked_root: bool,
    /// Maximum limb stretch as a fraction of rest length.
    pub max_limb_stretch: f32,
    /// Vertical pelvis travel allowance as a fraction of box height.
    pub pelvis_vertical_lock: f32,
}

impl Default for RigConstraints {
    fn default() -> Self {
        Self {
            locked_root: true,
            max_limb_stretch: 0.12,
            pelvis_vertical_lock: 0.06,
        }
    }
}

/// The synthesized skeleton + constraints descriptor driving limb
/// segmentation and animation. Persisted as `stages/rig.json`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rig {
    /// Skeleton template id.
    pub template_id: String,
    /// Working canvas dimensions.
    pub canvas: Dim,
    /// Animation frame dimensions.
    pub frame: Dim,
    /// Foreground bounding box the rig was derived from.
    pub bbox: BBox,
    /// Rigging constraints.
    pub constraints: RigConstraints,
    /// Pipeline version that produced this rig.
    pub pipeline_version: String,
    /// Template version that produced this rig.
    pub template_version: String,
}

/// Bundle the rig descriptor for a normalized subject.
///
/// No failure modes; this stage only computes derived numbers.
pub fn build_rig(bbox: BBox, pipeline_version: &str, template_version: &str) -> Rig {
    Rig {
        template_id: TEMPLATE_ID.to_string(),
        canvas: Dim {
            w: crate::normalize::WORK_CANVAS,
            h: crate::normalize::WORK_CANVAS,
        },
        frame: Dim {
            w: crate::animate::FRAME_W,
            h: crate::animate::FRAME_H,
        },
        bbox,
        constraints: RigConstraints::default(),
        pipeline_version: pipeline_version.to_string(),
        template_version: template_version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rig_carries_versions_and_geometry() {
        let bbox = BBox {
            min_x: 10,
            min_y: 12,
            w: 60,
            h: 100,
        };
        let rig = build_rig(bbox, "1.2.0", "humanoid-v1");
        assert_eq!(rig.template_id, TEMPLATE_ID);
        assert_eq!(rig.canvas, Dim { w: 128, h: 128 });
        assert_eq!(rig.frame, Dim { w: 32, h: 48 });
        assert_eq!(rig.bbox, bbox);
        assert!(rig.constraints.locked_root);
        assert_eq!(rig.pipeline_version, "1.2.0");
    }

    #[test]
    fn rig_serializes_camel_case() {
        let rig = build_rig(
            BBox {
                min_x: 0,
                min_y: 0,
                w: 1,
                h: 1,
            },
            "pv",
            "tv",
        );
        let json = serde_json::to_value(&rig).unwrap();
        assert!(json.get("templateId").is_some());
        assert!(json.get("constraints").unwrap().get("maxLimbStretch").is_some());
    }
}
