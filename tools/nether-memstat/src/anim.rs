//! Anim command - play a procedural rig through a scripted state sequence
//!
//! The rig is a single chain of joints. Clips swing the chain around Z with
//! different amplitudes and speeds; the machine has a `locomotion` layer
//! (idle, walk, jog, run) and an `upper` layer playing a ping-pong wave.

use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use glam::{Quat, Vec3};
use nether_anim::{
    Aabb, AnimationBlendMachine, AnimationConfig, AnimationInstance, Joint, JointTransform,
    PlaybackMode, SkeletalAnimation, SkeletalAnimationTrack, Skeleton, SkeletonPose,
};

/// Distance between consecutive joints of the chain
const BONE_LENGTH: f32 = 0.25;

/// Frames per generated clip
const CLIP_FRAMES: usize = 16;

/// Arguments for the anim command
#[derive(Args)]
pub struct AnimArgs {
    /// Number of update ticks
    #[arg(short, long, default_value_t = 240)]
    pub ticks: usize,

    /// Seconds per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Joints in the procedural chain
    #[arg(short, long, default_value_t = 24)]
    pub joints: usize,
}

/// Result of an anim run
#[derive(Debug, Clone)]
pub struct AnimReport {
    pub ticks: usize,
    pub joints: usize,
    pub final_state: Option<String>,
    pub root: Vec3,
    pub tip: Vec3,
    pub bounds: Aabb,
}

/// A clip swinging every joint around Z
///
/// The last frame equals the first so wrapped playback is seamless.
fn swing(name: &str, joints: usize, duration: f32, amplitude: f32, bob: f32) -> SkeletalAnimation {
    let mut clip = SkeletalAnimation::new(name, CLIP_FRAMES, duration);
    for joint in 0..joints {
        let frames = (0..CLIP_FRAMES)
            .map(|frame| {
                let phase = TAU * frame as f32 / (CLIP_FRAMES - 1) as f32;
                let angle = amplitude * (phase + joint as f32 * 0.3).sin();
                let position = if joint == 0 {
                    Vec3::new(0.0, bob * phase.sin().abs(), 0.0)
                } else {
                    Vec3::new(0.0, BONE_LENGTH, 0.0)
                };
                JointTransform {
                    position,
                    rotation: Quat::from_rotation_z(angle),
                    scale: Vec3::ONE,
                }
            })
            .collect();
        clip = clip.with_channel(joint, frames);
    }

    let reach = joints as f32 * BONE_LENGTH;
    let bounds = Aabb::new(Vec3::new(-reach, -reach, -0.5), Vec3::new(reach, reach + bob, 0.5));
    clip.with_bounds(vec![bounds; CLIP_FRAMES])
}

/// Chain skeleton with the demo clips
pub fn demo_skeleton(joints: usize) -> Result<Skeleton> {
    anyhow::ensure!(joints > 0, "rig needs at least one joint");

    let chain = (0..joints)
        .map(|i| Joint {
            name: format!("joint_{i}"),
            parent: i.checked_sub(1),
        })
        .collect();
    let bind_pose = (0..joints)
        .map(|i| {
            if i == 0 {
                JointTransform::IDENTITY
            } else {
                JointTransform::from_position(Vec3::new(0.0, BONE_LENGTH, 0.0))
            }
        })
        .collect();
    let height = joints as f32 * BONE_LENGTH;
    let bounds = Aabb::new(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, height, 0.5));

    let mut skeleton = Skeleton::new(chain, bind_pose, bounds).context("Invalid rig")?;
    skeleton.add_animation(swing("idle", joints, 2.0, 0.02, 0.0));
    skeleton.add_animation(swing("walk", joints, 1.0, 0.15, 0.05));
    skeleton.add_animation(swing("run", joints, 0.6, 0.3, 0.15));
    skeleton.add_animation(swing("wave", joints, 0.8, 0.5, 0.0));
    Ok(skeleton)
}

/// Two-layer locomotion machine over the demo clips
pub fn demo_machine() -> Result<AnimationBlendMachine> {
    let mut machine = AnimationBlendMachine::new();

    let locomotion = machine.add_layer("locomotion");
    let layer = machine.layer_mut(locomotion)?;
    let idle = layer.add_node(SkeletalAnimationTrack::new("idle").with_mode(PlaybackMode::Wrap));
    let walk = layer.add_node(SkeletalAnimationTrack::new("walk").with_mode(PlaybackMode::Wrap));
    let run = layer.add_node(SkeletalAnimationTrack::new("run").with_mode(PlaybackMode::Wrap));
    let jog = layer.add_blend_node([(walk, 0.5), (run, 0.5)])?;

    let idle = layer.add_state("idle", idle)?;
    let walk = layer.add_state("walk", walk)?;
    let jog = layer.add_state("jog", jog)?;
    let run = layer.add_state("run", run)?;
    layer.add_transition(idle, walk, 0.25, 0.0)?;
    layer.add_transition(walk, jog, 0.3, 1.0 / 0.8)?;
    layer.add_transition(jog, run, 0.3, 1.0 / 0.8)?;
    layer.add_transition(run, idle, 0.5, 0.0)?;

    let upper = machine.add_layer("upper");
    let layer = machine.layer_mut(upper)?;
    let wave = layer.add_node(
        SkeletalAnimationTrack::new("wave")
            .with_mode(PlaybackMode::Mirror)
            .with_quantizer(4.0),
    );
    layer.add_state("wave", wave)?;

    machine.validate()?;
    Ok(machine)
}

/// Instance over the demo rig with both layers started
pub fn demo_instance(joints: usize, config: AnimationConfig) -> Result<AnimationInstance> {
    let mut instance = AnimationInstance::new(Arc::new(demo_machine()?), config);
    instance.set_skeleton(Some(Arc::new(demo_skeleton(joints)?)));
    anyhow::ensure!(
        instance.set_layer_state_by_name("locomotion", "idle"),
        "demo machine has no locomotion/idle state"
    );
    anyhow::ensure!(
        instance.set_layer_state_by_name("upper", "wave"),
        "demo machine has no upper/wave state"
    );
    Ok(instance)
}

/// State requested at the start of each quarter of the run
const SCRIPT: [&str; 4] = ["idle", "walk", "jog", "run"];

fn current_state_name(instance: &AnimationInstance) -> Option<String> {
    let layer = instance.machine().layers().first()?;
    let state = instance.layer_data(0)?.current_state()?;
    Some(layer.state(state)?.name().to_string())
}

pub fn run(args: &AnimArgs, config: AnimationConfig) -> Result<AnimReport> {
    anyhow::ensure!(args.dt >= 0.0, "dt must not be negative");

    let mut instance = demo_instance(args.joints, config)?;
    let mut pose = SkeletonPose::new();
    let quarter = (args.ticks / SCRIPT.len()).max(1);
    let report_every = (args.ticks / 8).max(1);

    for tick in 0..args.ticks {
        if tick % quarter == 0
            && let Some(state) = SCRIPT.get(tick / quarter)
            && tick > 0
            && !instance.change_layer_state_by_name("locomotion", state)
        {
            tracing::warn!("State '{}' missing from locomotion layer", state);
        }

        instance.update(args.dt, &mut pose);

        if tick % report_every == 0 {
            let data = instance.layer_data(0).context("locomotion layer missing")?;
            tracing::debug!(
                "tick {}: state {:?}, transition blend {:.2}, root {:?}",
                tick,
                current_state_name(&instance),
                data.transition_blend(),
                pose.relative_transforms().first().map(|m| m.translation())
            );
        }
    }

    let absolute = pose.absolute_transforms();
    Ok(AnimReport {
        ticks: args.ticks,
        joints: pose.joints_count(),
        final_state: current_state_name(&instance),
        root: absolute.get(1).map(|m| m.translation()).unwrap_or(Vec3::ZERO),
        tip: absolute.last().map(|m| m.translation()).unwrap_or(Vec3::ZERO),
        bounds: *pose.bounds(),
    })
}

pub fn print_report(report: &AnimReport) {
    println!("Animation");
    println!("  Ticks:       {}", report.ticks);
    println!("  Joints:      {}", report.joints);
    println!(
        "  Final state: {}",
        report.final_state.as_deref().unwrap_or("<none>")
    );
    println!("  Root:        {:?}", report.root);
    println!("  Chain tip:   {:?}", report.tip);
    println!(
        "  Bounds:      {:?} .. {:?}",
        report.bounds.min, report.bounds.max
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ticks: usize) -> AnimArgs {
        AnimArgs {
            ticks,
            dt: 1.0 / 60.0,
            joints: 8,
        }
    }

    #[test]
    fn test_demo_rig_resolves_every_track() {
        let skeleton = demo_skeleton(8).unwrap();
        let machine = demo_machine().unwrap();
        for layer in machine.layers() {
            for node in layer.nodes() {
                if let Some(track) = node.track() {
                    assert!(skeleton.find_animation(track.animation()).is_some());
                }
            }
        }
    }

    #[test]
    fn test_zero_joint_rig_is_rejected() {
        assert!(demo_skeleton(0).is_err());
    }

    #[test]
    fn test_script_reaches_run() {
        let report = run(&args(240), AnimationConfig::default()).unwrap();
        assert_eq!(report.joints, 8);
        assert_eq!(report.final_state.as_deref(), Some("run"));
        assert!(report.tip.is_finite());
        assert!(report.tip.length() > 0.0);
    }

    #[test]
    fn test_bounds_come_from_clips() {
        let report = run(&args(30), AnimationConfig::default()).unwrap();
        // Clip bounds reach below the bind bounds' floor
        assert!(report.bounds.min.y < 0.0);
    }

    #[test]
    fn test_zero_ticks_leaves_empty_pose() {
        let report = run(&args(0), AnimationConfig::default()).unwrap();
        assert_eq!(report.joints, 0);
        assert_eq!(report.final_state.as_deref(), Some("idle"));
    }
}
