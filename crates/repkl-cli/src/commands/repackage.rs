use super::{colorize_action, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use repkl_core::{Action, RepackageReport, RepackageRequest, Repackager};
use std::path::Path;

pub fn run(request: &RepackageRequest, json: bool) -> Result<u8, String> {
    validate(request)?;

    let pb = if json {
        None
    } else {
        Some(spinner("repackaging..."))
    };

    let action = request.action;
    let result = Repackager::new().run_with_progress(request, |asset| {
        if let Some(ref pb) = pb {
            pb.set_message(format!("{action} {}", asset.destination.display()));
        }
    });

    let report = match result {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("repackaged {} assets", r.assets.len()));
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "repackaging failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(EXIT_SUCCESS)
}

fn validate(request: &RepackageRequest) -> Result<(), String> {
    require_file(&request.target, "target")?;
    if let Some(ref base) = request.base {
        require_file(base, "--ov")?;
    }
    if request.action != Action::DryRun && !request.destination.is_dir() {
        return Err(format!(
            "destination {} is not a directory",
            request.destination.display()
        ));
    }
    for dir in &request.mapped_file_sets {
        if !dir.is_dir() {
            return Err(format!("--delivery {} is not a directory", dir.display()));
        }
    }
    Ok(())
}

fn require_file(path: &Path, what: &str) -> Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("{what} {} is not a file", path.display()))
    }
}

fn print_report(report: &RepackageReport) {
    println!("action: {}", colorize_action(report.action));
    println!("composition: {}", report.target_id);
    if report.manifests_written {
        println!("packing list: {}", report.packing_list.display());
        println!("asset map: {}", report.asset_map.display());
    } else {
        println!("packing list: {} (not written)", report.packing_list.display());
        println!("asset map: {} (not written)", report.asset_map.display());
    }
    for asset in &report.assets {
        println!(
            "  {}  {} -> {}",
            asset.id,
            asset.source.display(),
            asset.destination.display()
        );
    }
}
