//! Route definitions for the warehouse inventory ledger

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/inventory", inventory_routes())
        .nest("/inbounds", inbound_routes())
        .nest("/outbounds", outbound_routes())
        .nest("/stock-moves", stock_move_routes())
        .nest("/stock-taking-plans", stock_taking_plan_routes())
        .nest("/stock-takings", stock_taking_routes())
        .nest("/picking-waves", picking_wave_routes())
        .nest("/picking-tasks", picking_task_routes())
        .nest("/reports", report_routes())
}

/// Balance queries, status changes and the movement log
fn inventory_routes() -> Router<AppState> {
    use handlers::inventory::*;
    Router::new()
        .route("/page", get(page_balances))
        .route("/balance", get(get_balance))
        .route("/status", post(change_status))
        .route("/movements", get(page_movements))
        .route("/verify", get(verify_balance))
}

fn inbound_routes() -> Router<AppState> {
    use handlers::inbound::*;
    Router::new()
        .route("/", post(create_inbound))
        .route("/page", get(page_inbounds))
        .route(
            "/:id",
            get(get_inbound).put(update_inbound).delete(delete_inbound),
        )
        .route("/:id/audit", post(audit_inbound))
        .route("/:id/start-receiving", post(start_receiving))
        .route("/:id/complete-item", post(receive_item))
        .route("/:id/complete", post(complete_inbound))
        .route("/:id/cancel", post(cancel_inbound))
}

fn outbound_routes() -> Router<AppState> {
    use handlers::outbound::*;
    Router::new()
        .route("/", post(create_outbound))
        .route("/page", get(page_outbounds))
        .route(
            "/:id",
            get(get_outbound).put(update_outbound).delete(delete_outbound),
        )
        .route("/:id/reservations", get(outbound_reservations))
        .route("/:id/audit", post(audit_outbound))
        .route("/:id/start-picking", post(start_picking))
        .route("/:id/complete-item", post(complete_item))
        .route("/:id/ship", post(ship_outbound))
        .route("/:id/cancel", post(cancel_outbound))
}

fn stock_move_routes() -> Router<AppState> {
    use handlers::stock_move::*;
    Router::new()
        .route("/", post(create_stock_move))
        .route("/page", get(page_stock_moves))
        .route(
            "/:id",
            get(get_stock_move)
                .put(update_stock_move)
                .delete(delete_stock_move),
        )
        .route("/:id/execute", post(execute_stock_move))
        .route("/:id/complete", post(complete_stock_move))
        .route("/:id/cancel", post(cancel_stock_move))
}

fn stock_taking_plan_routes() -> Router<AppState> {
    use handlers::stock_taking::*;
    Router::new()
        .route("/", post(create_plan))
        .route("/page", get(page_plans))
        .route("/:id", get(get_plan).put(update_plan).delete(delete_plan))
        .route("/:id/audit", post(audit_plan))
        .route("/:id/start", post(start_plan))
        .route("/:id/complete", post(complete_plan))
        .route("/:id/cancel", post(cancel_plan))
}

fn stock_taking_routes() -> Router<AppState> {
    use handlers::stock_taking::*;
    Router::new()
        .route("/", post(create_taking))
        .route("/page", get(page_takings))
        .route("/:id", get(get_taking))
        .route("/:id/submit", post(submit_count))
        .route("/:id/review", post(review_taking))
        .route("/:id/adjust", post(adjust_taking))
        .route("/:id/cancel", post(cancel_taking))
}

fn picking_wave_routes() -> Router<AppState> {
    use handlers::picking::*;
    Router::new()
        .route("/", post(create_wave))
        .route("/generate", post(generate_waves))
        .route("/page", get(page_waves))
        .route("/:id", get(get_wave))
        .route("/:id/tasks", get(wave_tasks))
        .route("/:id/assign", post(assign_wave))
        .route("/:id/start", post(start_wave))
        .route("/:id/cancel", post(cancel_wave))
}

fn picking_task_routes() -> Router<AppState> {
    use handlers::picking::*;
    Router::new()
        .route("/page", get(page_tasks))
        .route("/:id", get(get_task))
        .route("/:id/assign", post(assign_task))
        .route("/:id/start", post(start_task))
        .route("/:id/pick", post(pick))
        .route("/:id/exception", post(mark_exception))
        .route("/:id/resolve", post(resolve_exception))
        .route("/:id/cancel", post(cancel_task))
}

/// Read-only reports
fn report_routes() -> Router<AppState> {
    use handlers::reporting::*;
    Router::new()
        .route("/inventory", get(inventory_report))
        .route("/inventory/summary", get(inventory_summary))
        .route("/in-out", get(in_out_report))
        .route("/in-out/summary", get(in_out_summary))
        .route("/trend", get(trend))
        .route("/warnings", get(warnings))
        .route("/warnings/low-stock", get(low_stock))
        .route("/warnings/expiring", get(expiring))
        .route("/snapshots", get(snapshots).post(take_snapshot))
}
