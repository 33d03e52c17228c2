//! Command type definitions shared between main.rs and tests.

use clap::{Args, ValueEnum};
use dreamfusion_training::RunConfig;
use std::path::PathBuf;

/// Where run parameters are read from before training.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsSource {
    /// The remote parameters document (`params_uri` in the settings)
    Remote,
    /// The platform hyperparameters file, or `parameters.json` beside it
    Local,
    /// Command-line flags only
    None,
}

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub flags: RunFlags,

    /// Parameter source merged over the flags
    #[arg(long, value_enum, default_value = "remote")]
    pub params_source: ParamsSource,

    /// Do not mirror or upload artifacts after training
    #[arg(long)]
    pub skip_export: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ParamsCommand {
    #[command(flatten)]
    pub flags: RunFlags,

    /// Parameter source merged over the flags
    #[arg(long, value_enum, default_value = "remote")]
    pub params_source: ParamsSource,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MetadataCommand {
    /// Trainer log file (e.g. workspace/log_df.txt)
    pub log: PathBuf,

    /// Append the rendered attributes to the log
    #[arg(long)]
    pub append: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportCommand {
    /// Finished workspace directory
    pub workspace: PathBuf,

    /// The run used albedo shading only (no texture or material)
    #[arg(long)]
    pub albedo: bool,

    /// Skip the local mirror copy
    #[arg(long)]
    pub no_mirror: bool,
}

/// Options of a single run. Flag names follow the trainer's own option names.
#[derive(Args, Debug, Clone)]
pub struct RunFlags {
    /// Text prompt
    #[arg(long)]
    pub text: Option<String>,

    /// Negative text prompt
    #[arg(long, default_value = "")]
    pub negative: String,

    /// Equals --fp16 --cuda_ray --dir_text
    #[arg(short = 'O')]
    pub optimize: bool,

    /// Equals --backbone vanilla --dir_text --fp16
    #[arg(long = "O2")]
    pub optimize_vanilla: bool,

    /// Test mode
    #[arg(long)]
    pub test: bool,

    /// Evaluate on the valid set every interval epochs
    #[arg(long = "eval_interval", default_value_t = 1)]
    pub eval_interval: u32,

    #[arg(long, default_value = "workspace")]
    pub workspace: String,

    /// Choose from [stable-diffusion, clip]
    #[arg(long, default_value = "stable-diffusion")]
    pub guidance: String,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Export an obj mesh with texture
    #[arg(long = "save_mesh")]
    pub save_mesh: bool,

    /// Marching cubes resolution for extracting mesh
    #[arg(long = "mcubes_resolution", default_value_t = 256)]
    pub mcubes_resolution: u32,

    /// Target face number for mesh decimation
    #[arg(long = "decimate_target", default_value_t = 100_000)]
    pub decimate_target: u64,

    /// Training iters
    #[arg(long, default_value_t = 10_000)]
    pub iters: u64,

    /// Max learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Warm-up iters
    #[arg(long = "warm_iters", default_value_t = 500)]
    pub warm_iters: u64,

    /// Minimal learning rate
    #[arg(long = "min_lr", default_value_t = 1e-4)]
    pub min_lr: f64,

    #[arg(long, default_value = "latest")]
    pub ckpt: String,

    /// Use CUDA ray marching instead of pytorch
    #[arg(long = "cuda_ray")]
    pub cuda_ray: bool,

    /// Use taichi ray marching
    #[arg(long = "taichi_ray")]
    pub taichi_ray: bool,

    /// Max num steps sampled per ray (only valid when using --cuda_ray)
    #[arg(long = "max_steps", default_value_t = 1024)]
    pub max_steps: u32,

    /// Num steps sampled per ray (only valid when not using --cuda_ray)
    #[arg(long = "num_steps", default_value_t = 64)]
    pub num_steps: u32,

    /// Num steps up-sampled per ray (only valid when not using --cuda_ray)
    #[arg(long = "upsample_steps", default_value_t = 32)]
    pub upsample_steps: u32,

    /// Iter interval to update extra status (only valid when using --cuda_ray)
    #[arg(long = "update_extra_interval", default_value_t = 16)]
    pub update_extra_interval: u32,

    /// Batch size of rays at inference to avoid OOM (only valid when not using --cuda_ray)
    #[arg(long = "max_ray_batch", default_value_t = 4096)]
    pub max_ray_batch: u32,

    /// Only use albedo shading to train, overrides --albedo_iters
    #[arg(long)]
    pub albedo: bool,

    /// Training iters that only use albedo shading
    #[arg(long = "albedo_iters", default_value_t = 1000)]
    pub albedo_iters: u64,

    /// Add jitters to the randomly sampled camera poses
    #[arg(long = "jitter_pose")]
    pub jitter_pose: bool,

    /// Likelihood of sampling camera location uniformly on the sphere surface area
    #[arg(long = "uniform_sphere_rate", default_value_t = 0.5)]
    pub uniform_sphere_rate: f64,

    /// If positive, use a background model at sphere(bg_radius)
    #[arg(long = "bg_radius", default_value_t = 1.4)]
    pub bg_radius: f64,

    /// Density activation function
    #[arg(long = "density_activation", default_value = "softplus", value_parser = ["softplus", "exp"])]
    pub density_activation: String,

    /// Threshold for density grid to be occupied
    #[arg(long = "density_thresh", default_value_t = 0.1)]
    pub density_thresh: f64,

    /// Max (center) density for the density blob
    #[arg(long = "blob_density", default_value_t = 10.0)]
    pub blob_density: f64,

    /// Radius of the density blob
    #[arg(long = "blob_radius", default_value_t = 0.5)]
    pub blob_radius: f64,

    /// Use amp mixed precision training
    #[arg(long)]
    pub fp16: bool,

    /// NeRF backbone
    #[arg(long, default_value = "grid", value_parser = ["grid", "vanilla", "grid_taichi"])]
    pub backbone: String,

    /// Optimizer
    #[arg(long, default_value = "adan", value_parser = ["adan", "adam"])]
    pub optim: String,

    /// Stable diffusion version
    #[arg(long = "sd_version", default_value = "2.1", value_parser = ["1.5", "2.0", "2.1"])]
    pub sd_version: String,

    /// Hugging Face stable diffusion model key
    #[arg(long = "hf_key")]
    pub hf_key: Option<String>,

    /// Render width for NeRF in training
    #[arg(long = "w", default_value_t = 128)]
    pub train_width: u32,

    /// Render height for NeRF in training
    #[arg(long = "h", default_value_t = 128)]
    pub train_height: u32,

    /// Assume the scene is bounded in box(-bound, bound)
    #[arg(long, default_value_t = 1.0)]
    pub bound: f64,

    /// dt_gamma (>=0) for adaptive ray marching; 0 disables it
    #[arg(long = "dt_gamma", default_value_t = 0.0)]
    pub dt_gamma: f64,

    /// Minimum near distance for camera
    #[arg(long = "min_near", default_value_t = 0.1)]
    pub min_near: f64,

    /// Training camera radius range
    #[arg(long = "radius_range", num_args = 0.., default_values_t = vec![1.0, 1.5])]
    pub radius_range: Vec<f64>,

    /// Training camera fovy range
    #[arg(long = "fovy_range", num_args = 0.., default_values_t = vec![40.0, 70.0])]
    pub fovy_range: Vec<f64>,

    /// Direction-encode the text prompt by appending front/side/back/overhead view
    #[arg(long = "dir_text")]
    pub dir_text: bool,

    /// Also use negative dir text prompt
    #[arg(long = "suppress_face")]
    pub suppress_face: bool,

    /// [0, angle_overhead] is the overhead region
    #[arg(long = "angle_overhead", default_value_t = 30.0)]
    pub angle_overhead: f64,

    /// [0, angle_front] is the front region, [180, 180+angle_front] the back region, otherwise the side region
    #[arg(long = "angle_front", default_value_t = 60.0)]
    pub angle_front: f64,

    /// Loss scale for alpha entropy
    #[arg(long = "lambda_entropy", default_value_t = 1e-4)]
    pub lambda_entropy: f64,

    /// Loss scale for alpha value
    #[arg(long = "lambda_opacity", default_value_t = 0.0)]
    pub lambda_opacity: f64,

    /// Loss scale for orientation
    #[arg(long = "lambda_orient", default_value_t = 1e-2)]
    pub lambda_orient: f64,

    /// Loss scale for total variation
    #[arg(long = "lambda_tv", default_value_t = 0.0)]
    pub lambda_tv: f64,

    /// Start a GUI
    #[arg(long)]
    pub gui: bool,

    /// GUI width
    #[arg(long = "W", default_value_t = 800)]
    pub gui_width: u32,

    /// GUI height
    #[arg(long = "H", default_value_t = 800)]
    pub gui_height: u32,

    /// Default GUI camera radius from center
    #[arg(long, default_value_t = 3.0)]
    pub radius: f64,

    /// Default GUI camera fovy
    #[arg(long, default_value_t = 60.0)]
    pub fovy: f64,

    /// Default GUI light direction in [0, 180], corresponding to elevation [90, -90]
    #[arg(long = "light_theta", default_value_t = 60.0)]
    pub light_theta: f64,

    /// Default GUI light direction in [0, 360), azimuth
    #[arg(long = "light_phi", default_value_t = 0.0)]
    pub light_phi: f64,

    /// GUI rendering max sample per pixel
    #[arg(long = "max_spp", default_value_t = 1)]
    pub max_spp: u32,
}

impl From<RunFlags> for RunConfig {
    fn from(flags: RunFlags) -> Self {
        Self {
            text: flags.text,
            negative: flags.negative,
            optimize: flags.optimize,
            optimize_vanilla: flags.optimize_vanilla,
            test: flags.test,
            eval_interval: flags.eval_interval,
            workspace: flags.workspace,
            guidance: flags.guidance,
            seed: flags.seed,
            save_mesh: flags.save_mesh,
            mcubes_resolution: flags.mcubes_resolution,
            decimate_target: flags.decimate_target,
            iters: flags.iters,
            lr: flags.lr,
            warm_iters: flags.warm_iters,
            min_lr: flags.min_lr,
            ckpt: flags.ckpt,
            cuda_ray: flags.cuda_ray,
            taichi_ray: flags.taichi_ray,
            max_steps: flags.max_steps,
            num_steps: flags.num_steps,
            upsample_steps: flags.upsample_steps,
            update_extra_interval: flags.update_extra_interval,
            max_ray_batch: flags.max_ray_batch,
            albedo: flags.albedo,
            albedo_iters: flags.albedo_iters,
            jitter_pose: flags.jitter_pose,
            uniform_sphere_rate: flags.uniform_sphere_rate,
            bg_radius: flags.bg_radius,
            density_activation: flags.density_activation,
            density_thresh: flags.density_thresh,
            blob_density: flags.blob_density,
            blob_radius: flags.blob_radius,
            fp16: flags.fp16,
            backbone: flags.backbone,
            optim: flags.optim,
            sd_version: flags.sd_version,
            hf_key: flags.hf_key,
            train_width: flags.train_width,
            train_height: flags.train_height,
            bound: flags.bound,
            dt_gamma: flags.dt_gamma,
            min_near: flags.min_near,
            radius_range: flags.radius_range,
            fovy_range: flags.fovy_range,
            dir_text: flags.dir_text,
            suppress_face: flags.suppress_face,
            angle_overhead: flags.angle_overhead,
            angle_front: flags.angle_front,
            lambda_entropy: flags.lambda_entropy,
            lambda_opacity: flags.lambda_opacity,
            lambda_orient: flags.lambda_orient,
            lambda_tv: flags.lambda_tv,
            gui: flags.gui,
            gui_width: flags.gui_width,
            gui_height: flags.gui_height,
            radius: flags.radius,
            fovy: flags.fovy,
            light_theta: flags.light_theta,
            light_phi: flags.light_phi,
            max_spp: flags.max_spp,
        }
    }
}
