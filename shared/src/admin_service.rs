use crate::http::{make_boxed_error_response, make_text_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared readiness flag flipped by the owning service once it accepts traffic.
#[derive(Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Serves `/health` and `/ready` for orchestrator probes.
pub struct AdminService<E> {
    readiness: Readiness,
    _error: PhantomData<fn() -> E>,
}

impl<E> AdminService<E> {
    pub fn new(readiness: Readiness) -> Self {
        Self {
            readiness,
            _error: PhantomData,
        }
    }

    fn respond(&self, path: &str) -> Response<BoxBody<Bytes, Infallible>> {
        match path {
            "/health" => make_text_response(StatusCode::OK, "ok\n"),
            "/ready" => match self.readiness.is_ready() {
                true => make_text_response(StatusCode::OK, "ok\n"),
                false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
            },
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl<E> Service<Request<Incoming>> for AdminService<E>
where
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = self.respond(req.uri().path());
        Box::pin(async move { Ok(res) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::run_http_service;

    #[test]
    fn test_probe_paths() {
        let readiness = Readiness::new();
        let service = AdminService::<std::io::Error>::new(readiness.clone());

        assert_eq!(service.respond("/health").status(), StatusCode::OK);
        assert_eq!(
            service.respond("/ready").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(service.respond("/other").status(), StatusCode::NOT_FOUND);

        readiness.set_ready(true);
        assert_eq!(service.respond("/ready").status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_listener_serves_probes() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let readiness = Readiness::new();
        readiness.set_ready(true);

        tokio::spawn(run_http_service::<_, std::io::Error>(
            "127.0.0.1",
            port,
            AdminService::new(readiness),
        ));

        let url = format!("http://127.0.0.1:{port}/ready");
        let mut response = None;
        for _ in 0..20 {
            match reqwest::get(&url).await {
                Ok(r) => {
                    response = Some(r);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
            }
        }

        let response = response.expect("admin listener did not come up");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "ok\n");
    }
}
