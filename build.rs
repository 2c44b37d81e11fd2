//! Build script: git hash for the version string, plus a toolkit check for
//! GPU feature flags so a missing SDK fails early with a readable message
//! instead of deep inside the whisper.cpp build.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    let toolkits: [(bool, &str, &[&str], &str); 3] = [
        (
            cfg!(feature = "cuda"),
            "nvcc",
            &["--version"],
            "CUDA toolkit (https://developer.nvidia.com/cuda-downloads)",
        ),
        (
            cfg!(feature = "vulkan"),
            "vulkaninfo",
            &["--summary"],
            "Vulkan SDK (https://vulkan.lunarg.com/)",
        ),
        (
            cfg!(feature = "hipblas"),
            "rocminfo",
            &[],
            "ROCm (https://rocm.docs.amd.com/)",
        ),
    ];

    for (enabled, tool, args, toolkit) in toolkits {
        if enabled && !tool_runs(tool, args) {
            panic!(
                "\n\n`{tool}` not found: the {toolkit} is not installed.\n\
                 Install it, or build without the GPU feature: cargo build --release --features whisper\n"
            );
        }
    }

    if cfg!(feature = "openblas") && !openblas_present() {
        panic!(
            "\n\nOpenBLAS not found.\n\
             Install: sudo apt install libopenblas-dev\n\
             Or build without OpenBLAS: cargo build --release --features whisper\n"
        );
    }
}

fn tool_runs(tool: &str, args: &[&str]) -> bool {
    Command::new(tool).args(args).output().is_ok()
}

fn openblas_present() -> bool {
    let pkg_config_ok = Command::new("pkg-config")
        .args(["--exists", "openblas"])
        .status()
        .is_ok_and(|s| s.success());

    pkg_config_ok
        || [
            "/usr/lib/x86_64-linux-gnu/libopenblas.so",
            "/usr/lib/libopenblas.so",
            "/usr/lib64/libopenblas.so",
        ]
        .iter()
        .any(|path| std::path::Path::new(path).exists())
}
