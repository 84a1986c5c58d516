use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;

use crate::{auth::Claims, errors::AppError, guard::AbuseGuard};

/// Applies the per-user attempt rate limit before any handler runs. Only
/// mutating attempt-related requests are counted; reads (list, get-one,
/// statistics) pass through.
pub struct RateLimitMiddleware;

fn is_attempt_route(path: &str) -> bool {
    path.starts_with("/api/quiz-attempts/")
        || (path.starts_with("/api/quizzes/") && path.ends_with("/attempts"))
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let counted = req.method() != Method::GET && is_attempt_route(req.path());

            if counted {
                let guard = req
                    .app_data::<actix_web::web::Data<AbuseGuard>>()
                    .cloned()
                    .ok_or_else(|| {
                        Error::from(AppError::InternalError(
                            "Abuse guard not configured".to_string(),
                        ))
                    })?;

                // Auth middleware runs first, so claims are present for any
                // request that gets this far.
                let user_id = req
                    .extensions()
                    .get::<Claims>()
                    .map(|claims| claims.sub.clone())
                    .ok_or_else(|| {
                        Error::from(AppError::Unauthorized("Not authenticated".to_string()))
                    })?;

                guard
                    .check_rate_limit(&user_id)
                    .await
                    .map_err(Error::from)?;
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::header::AUTHORIZATION, http::StatusCode, test, web, App, HttpResponse};
    use secrecy::SecretString;

    use super::*;
    use crate::{
        auth::{AuthMiddleware, JwtService},
        config::GuardConfig,
        guard::InMemoryRateLimitStore,
    };

    #[::core::prelude::v1::test]
    fn attempt_route_matching() {
        assert!(is_attempt_route("/api/quiz-attempts/abc/submit"));
        assert!(is_attempt_route("/api/quiz-attempts/abc/progress"));
        assert!(is_attempt_route("/api/quizzes/quiz-1/attempts"));

        assert!(!is_attempt_route("/api/quizzes/quiz-1"));
        assert!(!is_attempt_route("/api/user/quiz-attempts"));
        assert!(!is_attempt_route("/api/health"));
    }

    fn bearer_token(jwt: &JwtService) -> String {
        let token = jwt.create_token("user-1", "user@example.com", 1).unwrap();
        format!("Bearer {}", token)
    }

    #[actix_web::test]
    async fn test_mutating_attempt_request_over_cap_gets_429() {
        let jwt = JwtService::new(&SecretString::from("test_jwt_secret_key".to_string()));
        let bearer = bearer_token(&jwt);
        let guard = Arc::new(AbuseGuard::new(
            Arc::new(InMemoryRateLimitStore::new()),
            GuardConfig {
                rate_limit_per_minute: 2,
                ..GuardConfig::default()
            },
        ));

        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(jwt))
                .app_data(actix_web::web::Data::from(guard))
                .wrap(RateLimitMiddleware)
                .wrap(AuthMiddleware)
                .route(
                    "/api/quiz-attempts/a-1/submit",
                    web::post().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/quiz-attempts/a-1/submit")
                .insert_header((AUTHORIZATION, bearer.clone()))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post()
            .uri("/api/quiz-attempts/a-1/submit")
            .insert_header((AUTHORIZATION, bearer.clone()))
            .to_request();
        let err = test::try_call_service(&app, req)
            .await
            .expect_err("third mutating request should be rejected");
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn test_read_requests_are_not_counted() {
        let jwt = JwtService::new(&SecretString::from("test_jwt_secret_key".to_string()));
        let bearer = bearer_token(&jwt);
        let guard = Arc::new(AbuseGuard::new(
            Arc::new(InMemoryRateLimitStore::new()),
            GuardConfig {
                rate_limit_per_minute: 1,
                ..GuardConfig::default()
            },
        ));

        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(jwt))
                .app_data(actix_web::web::Data::from(guard))
                .wrap(RateLimitMiddleware)
                .wrap(AuthMiddleware)
                .route(
                    "/api/quiz-attempts/a-1",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        // Reads on attempt routes never consume rate-limit budget.
        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/api/quiz-attempts/a-1")
                .insert_header((AUTHORIZATION, bearer.clone()))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
