use appforge_cli::Cli;
use appforge_cli::Color;

fn walk_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk_files(&path));
            } else {
                out.push(path);
            }
        }
    }
    out
}

#[tokio::test]
async fn drives_one_session_to_completion_without_deploy() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let cli = Cli {
        query: "a todo list app".to_string(),
        template: "vanilla-react".to_string(),
        workdir: Some(workdir.path().to_path_buf()),
        skip_deploy: true,
        color: Color::Never,
    };

    appforge_cli::run_main(cli).await.expect("run_main should succeed");

    // generated file contents live in the agent's state snapshot, not on
    // disk; the one thing the sandbox itself writes eagerly is the
    // bootstrap marker for the session it created.
    let files = walk_files(workdir.path());
    assert!(
        files.iter().any(|f| f.file_name().map(|n| n == ".appforge-template").unwrap_or(false)),
        "expected a bootstrapped sandbox session dir under {:?}, found {:?}",
        workdir.path(),
        files
    );
}

#[tokio::test]
async fn drives_one_session_to_completion_with_preview_deploy() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let cli = Cli {
        query: "a weather dashboard".to_string(),
        template: "vanilla-react".to_string(),
        workdir: Some(workdir.path().to_path_buf()),
        skip_deploy: false,
        color: Color::Never,
    };

    appforge_cli::run_main(cli).await.expect("run_main should succeed");
}
