//! Normal Estimation Demo
//!
//! Builds a colored cloud made of a noisy plane and a sphere resting on it,
//! estimates normals and surface variation, and prints how well the normals
//! follow each shape.

use anyhow::{Context, Result};
use clap::Parser;
use planefit_algorithms::{
    estimate_normals_with_config, normal_line_segments, NormalEstimationConfig,
    DEFAULT_K_NEIGHBORS, DEFAULT_NORMAL_LENGTH,
};
use planefit_core::{Point3f, PointCloud, Vector3f, CURVATURE_ATTRIBUTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PLANE_RESOLUTION: usize = 40;
const SPHERE_CENTER_Z: f32 = 1.0;
const SPHERE_RADIUS: f32 = 0.9;

#[derive(Parser)]
#[command(name = "normal_estimation_demo")]
#[command(about = "Estimate normals on a synthetic plane and sphere", long_about = None)]
struct Cli {
    /// Neighbourhood size, including the point itself
    #[arg(short, long, default_value_t = DEFAULT_K_NEIGHBORS)]
    k: usize,

    /// Run the per-point pass on the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// Amplitude of the vertical noise added to the plane
    #[arg(long, default_value_t = 0.005)]
    noise: f32,

    /// Seed for the noise generator
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "normal_estimation_demo=info,planefit_algorithms=info",
            1 => "normal_estimation_demo=debug,planefit_algorithms=debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn sphere_center() -> Point3f {
    Point3f::new(0.0, 0.0, SPHERE_CENTER_Z)
}

/// Points `0..plane_len` lie on the plane, the rest on the sphere
fn create_scene(noise: f32, seed: u64) -> Result<(PointCloud, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::new();
    let mut colors = Vec::new();

    for i in 0..PLANE_RESOLUTION {
        for j in 0..PLANE_RESOLUTION {
            let x = (i as f32 / (PLANE_RESOLUTION - 1) as f32 - 0.5) * 6.0;
            let y = (j as f32 / (PLANE_RESOLUTION - 1) as f32 - 0.5) * 6.0;
            let z = if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };
            points.push(Point3f::new(x, y, z));
            colors.push([128, 128, 128]);
        }
    }
    let plane_len = points.len();

    for i in 1..30 {
        let theta = std::f32::consts::PI * i as f32 / 30.0;
        for j in 0..40 {
            let phi = 2.0 * std::f32::consts::PI * j as f32 / 40.0;
            let direction = Vector3f::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            // Skip the cap that would sink into the plane.
            if direction.z < -0.8 {
                continue;
            }
            points.push(sphere_center() + direction * SPHERE_RADIUS);
            let shade = (127.0 * (direction.z + 1.0)) as u8;
            colors.push([shade, 64, 255 - shade]);
        }
    }

    let cloud = PointCloud::from_points(points).with_colors(colors)?;
    Ok((cloud, plane_len))
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    println!("Normal Estimation Demo");
    println!("======================");

    let (mut cloud, plane_len) = create_scene(cli.noise, cli.seed)?;
    info!(
        points = cloud.len(),
        plane = plane_len,
        sphere = cloud.len() - plane_len,
        noise = cli.noise,
        "Created scene"
    );

    let config = NormalEstimationConfig {
        k_neighbors: cli.k,
        parallel: cli.parallel,
        compute_curvature: true,
        ..NormalEstimationConfig::default()
    };

    let start = Instant::now();
    let report = estimate_normals_with_config(&mut cloud, &config)
        .context("normal estimation failed")?;
    println!(
        "Estimated {} normals with k = {} in {:?} ({} degenerate neighbourhoods)",
        report.points,
        report.k_neighbors,
        start.elapsed(),
        report.degenerate
    );

    let normals = cloud
        .normals()
        .and_then(|n| n.to_vec())
        .context("normal attribute is incomplete")?;
    let curvature = cloud
        .get_attribute::<f32>(CURVATURE_ATTRIBUTE)
        .and_then(|c| c.to_vec())
        .context("curvature attribute is incomplete")?;

    let plane_alignment = mean(normals[..plane_len].iter().map(|n| n.z.abs()));
    let sphere_alignment = mean(
        cloud.points()[plane_len..]
            .iter()
            .zip(&normals[plane_len..])
            .map(|(p, n)| n.dot(&(p - sphere_center()).normalize()).abs()),
    );

    println!("\nShape         mean |cos| to true normal   mean surface variation");
    println!(
        "plane         {:>24.4}   {:>22.6}",
        plane_alignment,
        mean(curvature[..plane_len].iter().copied())
    );
    println!(
        "sphere        {:>24.4}   {:>22.6}",
        sphere_alignment,
        mean(curvature[plane_len..].iter().copied())
    );

    let segments = normal_line_segments(&cloud, DEFAULT_NORMAL_LENGTH)?;
    println!(
        "\nPrepared {} normal segments of length {} for rendering",
        segments.len(),
        DEFAULT_NORMAL_LENGTH
    );
    if let Some([from, to]) = segments.first() {
        println!("  first segment: {from} -> {to}");
    }

    Ok(())
}
