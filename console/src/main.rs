fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Deterministic workflow proof mode (no database, no network).
    // Writes `W1_workflow_smoke_transcript.log` under `Console_Log/` and exits 0/1.
    if args.iter().any(|a| a == "--workflow-smoke") {
        onboarding_console::run_workflow_smoke();
        return;
    }

    // Deterministic upload pipeline proof mode (no network).
    // Writes `W2_upload_smoke_transcript.log` under `Console_Log/` and exits 0/1.
    if args.iter().any(|a| a == "--upload-smoke") {
        onboarding_console::run_upload_smoke();
        return;
    }

    // Push unsynced write-ahead cache entries to the record store.
    // Requires real configuration (database URL, backend credentials).
    if args.iter().any(|a| a == "--reconcile") {
        onboarding_console::run_reconcile();
        return;
    }

    eprintln!("onboarding-console: headless console core");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  --workflow-smoke   run the offline workflow proof and exit");
    eprintln!("  --upload-smoke     run the offline upload proof and exit");
    eprintln!("  --reconcile        push pending local saves to the record store");
    std::process::exit(2);
}
