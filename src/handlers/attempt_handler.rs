use actix_web::{get, post, put, web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{
        PaginationParams, StartAttemptRequest, SubmitAttemptRequest, UpdateProgressRequest,
    },
    models::dto::response::{
        AbandonAttemptResponse, AttemptListResponse, PageMeta, ProgressSavedResponse,
        QuizViewDto, ResultsDto, ResumeAttemptResponse, StartAttemptResponse,
        StatisticsResponse, SubmitAttemptResponse,
    },
    services::StartOutcome,
};

/// Network origin of the caller, for the ownership-violation security event.
/// Honors proxy forwarding headers when present.
fn caller_origin(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(ToOwned::to_owned)
}

#[post("/api/quizzes/{quiz_id}/attempts")]
async fn start_attempt(
    state: web::Data<AppState>,
    quiz_id: web::Path<String>,
    request: web::Json<StartAttemptRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let (outcome, attempt, quiz) = state
        .attempt_service
        .start(&auth.0.sub, &quiz_id, request.force_new)
        .await?;

    let quiz_view = QuizViewDto::for_attempt(&quiz, &attempt);
    let body = StartAttemptResponse {
        status: match outcome {
            StartOutcome::Created => "created",
            StartOutcome::Resumed => "resume",
        },
        attempt: attempt.into(),
        quiz: quiz_view,
    };

    Ok(match outcome {
        StartOutcome::Created => HttpResponse::Created().json(body),
        StartOutcome::Resumed => HttpResponse::Ok().json(body),
    })
}

#[post("/api/quiz-attempts/{attempt_id}/resume")]
async fn resume_attempt(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let origin = caller_origin(&req);
    let attempt = state
        .attempt_service
        .resume(&auth.0.sub, &attempt_id, origin.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ResumeAttemptResponse {
        attempt: attempt.into(),
    }))
}

#[put("/api/quiz-attempts/{attempt_id}/progress")]
async fn update_progress(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    request: web::Json<UpdateProgressRequest>,
    auth: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let origin = caller_origin(&req);
    let attempt = state
        .attempt_service
        .update_progress(&auth.0.sub, &attempt_id, &request, origin.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ProgressSavedResponse {
        status: "progress_saved",
        attempt: attempt.into(),
    }))
}

#[post("/api/quiz-attempts/{attempt_id}/submit")]
async fn submit_attempt(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    request: web::Json<SubmitAttemptRequest>,
    auth: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let origin = caller_origin(&req);
    let (attempt, summary) = state
        .attempt_service
        .submit(&auth.0.sub, &attempt_id, &request, origin.as_deref())
        .await?;

    let results = ResultsDto::new(
        summary,
        attempt.progress.completion_percentage,
        attempt.progress.time_spent_seconds,
    );

    Ok(HttpResponse::Ok().json(SubmitAttemptResponse {
        status: "completed",
        attempt: attempt.into(),
        results,
    }))
}

#[post("/api/quiz-attempts/{attempt_id}/abandon")]
async fn abandon_attempt(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let origin = caller_origin(&req);
    let attempt = state
        .attempt_service
        .abandon(&auth.0.sub, &attempt_id, origin.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(AbandonAttemptResponse {
        status: "abandoned",
        attempt: attempt.into(),
    }))
}

#[get("/api/user/quiz-attempts")]
async fn list_my_attempts(
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    params.validate()?;

    let (attempts, total) = state
        .attempt_service
        .list_attempts(&auth.0.sub, params.offset(), params.limit())
        .await?;

    Ok(HttpResponse::Ok().json(AttemptListResponse {
        attempts: attempts.into_iter().map(Into::into).collect(),
        meta: PageMeta {
            total,
            offset: params.offset(),
            limit: params.limit(),
        },
    }))
}

#[get("/api/quiz-attempts/{attempt_id}")]
async fn get_attempt(
    state: web::Data<AppState>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let origin = caller_origin(&req);
    let attempt = state
        .attempt_service
        .get_attempt(&auth.0.sub, &attempt_id, origin.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ResumeAttemptResponse {
        attempt: attempt.into(),
    }))
}

#[get("/api/user/attempt-statistics")]
async fn attempt_statistics(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let stats = state.attempt_service.statistics(&auth.0.sub).await?;

    Ok(HttpResponse::Ok().json(StatisticsResponse {
        total_attempts: stats.total_attempts,
        completed_attempts: stats.completed_attempts,
        completion_rate: stats.completion_rate,
        average_score: stats.average_score,
        best_score: stats.best_score,
        total_time_spent: stats.total_time_spent,
        recent_attempts: stats.recent_attempts.into_iter().map(Into::into).collect(),
    }))
}
