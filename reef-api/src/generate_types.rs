//! TypeScript bindings for the dashboard UI.
//!
//! Running the test suite writes one `.ts` file per exported API type.

#[cfg(test)]
mod tests {
    use std::{env, path::Path};

    use ts_rs::TS;

    #[test]
    fn generate_typescript_types() {
        // REEF_TS_OUTPUT_DIR wins; otherwise ../ts-bindings
        let output_dir_str =
            env::var("REEF_TS_OUTPUT_DIR").unwrap_or_else(|_| "../ts-bindings".to_string());
        let output_dir = Path::new(&output_dir_str);

        std::fs::create_dir_all(output_dir).expect("Failed to create output directory");

        // Drop stale bindings so renamed types don't linger
        for entry in std::fs::read_dir(output_dir).expect("Failed to read output directory") {
            let path = entry.expect("Failed to read directory entry").path();
            if path.extension().and_then(|s| s.to_str()) == Some("ts") {
                std::fs::remove_file(&path).expect("Failed to remove old binding");
            }
        }

        unsafe {
            env::set_var("TS_RS_EXPORT_DIR", output_dir);
        }

        use crate::{
            api::{
                ErrorResponse,
                login::{LoginRequest, LoginSuccessResponse},
                stats::{LabelBoxPlot, WeeklyHeatmap},
                status::HealthStatus,
                user::{CreateUserRequest, UserRoleRequest},
            },
            models::*,
            stats::{BoxPlotSummary, CellStats, HeatmapCell},
        };

        Reading::export().expect("Failed to export Reading type");
        ReadingInput::export().expect("Failed to export ReadingInput type");
        ReadingValueUpdate::export().expect("Failed to export ReadingValueUpdate type");
        LatestReading::export().expect("Failed to export LatestReading type");
        RecordState::export().expect("Failed to export RecordState type");
        QueryField::export().expect("Failed to export QueryField type");

        BoxPlotSummary::export().expect("Failed to export BoxPlotSummary type");
        CellStats::export().expect("Failed to export CellStats type");
        HeatmapCell::export().expect("Failed to export HeatmapCell type");
        LabelBoxPlot::export().expect("Failed to export LabelBoxPlot type");
        WeeklyHeatmap::export().expect("Failed to export WeeklyHeatmap type");

        User::export().expect("Failed to export User type");
        UserWithRoles::export().expect("Failed to export UserWithRoles type");
        Role::export().expect("Failed to export Role type");
        NewRole::export().expect("Failed to export NewRole type");

        ErrorResponse::export().expect("Failed to export ErrorResponse type");
        HealthStatus::export().expect("Failed to export HealthStatus type");
        LoginRequest::export().expect("Failed to export LoginRequest type");
        LoginSuccessResponse::export().expect("Failed to export LoginSuccessResponse type");
        CreateUserRequest::export().expect("Failed to export CreateUserRequest type");
        UserRoleRequest::export().expect("Failed to export UserRoleRequest type");

        let written = std::fs::read_dir(output_dir)
            .expect("Failed to read output directory")
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("ts"))
            .count();
        assert!(written > 0, "no TypeScript bindings were written");
    }
}
