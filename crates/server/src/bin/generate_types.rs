use std::{env, fs, path::Path};

use ts_rs::TS;

const HEADER: &str = "// This file was generated by `cargo run --bin generate_types`.\n// Do not edit it by hand.";

fn generate_types_content() -> String {
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<(), ()>::decl(),
        db::models::user::UserRole::decl(),
        db::models::user::User::decl(),
        db::models::user::CreateUser::decl(),
        db::models::user::UpdateUser::decl(),
        db::models::lookup::LookupKind::decl(),
        db::models::lookup::LookupItem::decl(),
        db::models::lookup::CreateLookupItem::decl(),
        db::models::lookup::UpdateLookupItem::decl(),
        db::models::lookup::FeedbackRelatedData::decl(),
        db::models::case::CaseStatus::decl(),
        db::models::case::CasePriority::decl(),
        db::models::case::Case::decl(),
        db::models::case::CaseDetail::decl(),
        db::models::case::CreateCase::decl(),
        db::models::case::UpdateCase::decl(),
        db::models::case::CaseFilter::decl(),
        db::models::comment::Comment::decl(),
        db::models::comment::CreateComment::decl(),
        db::models::assignment_history::AssignmentHistory::decl(),
        db::models::assignment_history::AssignmentTimelineEntry::decl(),
        db::models::dashboard::StatusCount::decl(),
        db::models::dashboard::PriorityCount::decl(),
        db::models::dashboard::CategoryCount::decl(),
        db::models::dashboard::DashboardSummary::decl(),
        services::services::case::ChangeCaseStatus::decl(),
        services::services::case::AssignCase::decl(),
        services::services::case::EscalateCase::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            let trimmed = decl.trim_start();
            if trimmed.starts_with("export") {
                decl
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{HEADER}\n\n{body}\n")
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        }
        eprintln!("❌ shared/types.ts is out of date. Run `cargo run --bin generate_types`.");
        std::process::exit(1);
    }

    fs::create_dir_all(shared_path).expect("cannot create shared/");
    fs::write(&types_path, generated).expect("unable to write types.ts");
    println!("✅ TypeScript types written to {}", types_path.display());
}
