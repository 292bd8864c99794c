/// Subcommand implementations
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use stlview_core::{
    generate, save_async, stl::load_async_with_format, Bounds, CancelFlag, Camera, Mesh,
    Progress, StlFormat, Viewpoint,
};
use tracing::warn;

/// Procedurally generated shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shape {
    /// Noisy cone with axis spikes and arrow reliefs
    Cone,
    /// Wavy terrain with corner pillars and a north arrow
    Terrain,
    /// Axis-aligned cube
    Cube,
}

impl Shape {
    pub fn build(self, triangles: usize, width: usize, height: usize, size: f32) -> Mesh {
        match self {
            Shape::Cone => generate::directional_cone(triangles),
            Shape::Terrain => generate::oriented_terrain(width, height),
            Shape::Cube => Mesh::cube(size),
        }
    }
}

/// Cancel flag raised by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancelFlag {
    let flag = CancelFlag::new();
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });
    flag
}

/// Single-line progress display on stderr
fn print_progress(progress: &Progress) {
    let mut stderr = std::io::stderr().lock();
    // Best effort
    let _ = write!(stderr, "\r{:>3}% {:<60}", progress.percent, progress.message);
    if progress.percent == 100 {
        let _ = writeln!(stderr);
    }
    let _ = stderr.flush();
}

/// Load `path` once, returning the mesh and the format it was detected as
pub async fn load(path: &Path, cancel: &CancelFlag) -> anyhow::Result<(Mesh, StlFormat)> {
    load_async_with_format(path, Some(&print_progress), Some(cancel))
        .await
        .with_context(|| format!("failed to load {}", path.display()))
}

/// Human-readable report printed by `stlview info`
fn summary(path: &Path, mesh: &Mesh, format: StlFormat) -> Vec<String> {
    let mut lines = vec![
        format!("File:      {}", path.display()),
        format!("Format:    {format}"),
        format!("Solid:     {}", mesh.name),
        format!("Triangles: {}", mesh.triangle_count()),
    ];

    if let Some(bounds) = Bounds::from_mesh(mesh) {
        let (min, max) = (bounds.min, bounds.max);
        let (center, size) = (bounds.center(), bounds.size());
        lines.push(format!(
            "Bounds:    [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
            min.x, min.y, min.z, max.x, max.y, max.z
        ));
        lines.push(format!("Size:      {:.3} x {:.3} x {:.3}", size.x, size.y, size.z));
        lines.push(format!("Center:    ({:.3}, {:.3}, {:.3})", center.x, center.y, center.z));
        lines.push("Viewpoints:".to_string());
        for viewpoint in Viewpoint::ALL {
            let eye = Camera::framing(&bounds, viewpoint, 4.0 / 3.0).position;
            lines.push(format!(
                "  {:<7} eye at ({:.3}, {:.3}, {:.3})",
                viewpoint.label(),
                eye.x,
                eye.y,
                eye.z
            ));
        }
    }

    lines
}

pub async fn info(path: &Path) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    let (mesh, format) = load(path, &cancel).await?;
    for line in summary(path, &mesh, format) {
        println!("{line}");
    }
    Ok(())
}

pub async fn convert(input: &Path, output: &Path, format: StlFormat) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    let (mesh, _) = load(input, &cancel).await?;
    save(&mesh, output, format, &cancel).await?;
    println!(
        "Converted {} triangles: {} -> {} ({format})",
        mesh.triangle_count(),
        input.display(),
        output.display()
    );
    Ok(())
}

pub async fn write(mesh: &Mesh, output: &Path, format: StlFormat) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    save(mesh, output, format, &cancel).await?;
    println!(
        "Wrote {} triangles to {} ({format})",
        mesh.triangle_count(),
        output.display()
    );
    Ok(())
}

async fn save(
    mesh: &Mesh,
    output: &Path,
    format: StlFormat,
    cancel: &CancelFlag,
) -> anyhow::Result<()> {
    save_async(mesh, output, format, Some(&print_progress), Some(cancel))
        .await
        .with_context(|| format!("failed to save {}", output.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stlview_core::stl;

    #[test]
    fn test_shape_build() {
        assert_eq!(Shape::Cube.build(0, 0, 0, 1.0).triangle_count(), 12);
        assert!(Shape::Terrain.build(0, 4, 4, 0.0).triangle_count() > 18);
    }

    #[tokio::test]
    async fn test_write_then_convert() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("cube.stl");
        let ascii = dir.path().join("cube_ascii.stl");

        write(&Mesh::cube(1.0), &binary, StlFormat::Binary).await.unwrap();
        convert(&binary, &ascii, StlFormat::Ascii).await.unwrap();

        assert_eq!(stl::detect_format(&ascii).unwrap(), StlFormat::Ascii);
        assert_eq!(stl::load(&ascii).unwrap().triangle_count(), 12);
    }

    #[tokio::test]
    async fn test_load_reports_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        stl::save(&Mesh::cube(2.0), &path, StlFormat::Ascii).unwrap();

        let (mesh, format) = load(&path, &CancelFlag::new()).await.unwrap();
        assert_eq!(format, StlFormat::Ascii);

        let lines = summary(&path, &mesh, format);
        assert_eq!(lines[1], "Format:    ascii");
        assert_eq!(lines[2], "Solid:     cube");
        assert_eq!(lines[3], "Triangles: 12");
        assert!(lines.contains(&"Center:    (0.000, 0.000, 0.000)".to_string()));
        assert_eq!(lines.iter().filter(|l| l.contains("eye at")).count(), 6);
    }
}
