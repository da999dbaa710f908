/// MOCO browser-extension REST client
use std::rc::Rc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use crate::error::{ApiError, FormErrors, TransportError};
use crate::model::{
    ActivitiesStatus, Activity, ProjectsResponse, RecordedActivity, Schedule, Service, TimedActivity,
};
use crate::ports::{ApiClient, HttpRequest, HttpResponse, HttpTransport};
use crate::settings::Settings;
use crate::time_format::format_date;

const API_PATH: &str = "/api/browser_extensions/";
const EXTENSION_VERSION: &str = "x-extension-version";

pub struct MocoClient {
    transport: Rc<dyn HttpTransport>,
    subdomain: String,
    api_key: String,
    version: String,
    today: NaiveDate,
}

impl MocoClient {
    pub fn new(settings: &Settings, transport: Rc<dyn HttpTransport>, today: NaiveDate) -> Self {
        MocoClient {
            transport,
            subdomain: settings.subdomain.trim().to_string(),
            api_key: settings.api_key.clone(),
            version: settings.version.clone(),
            today,
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let base = format!("https://{}.mocoapp.com{}", self.subdomain, API_PATH);
        let mut url = Url::parse(&base)
            .and_then(|base| base.join(path))
            .map_err(|e| ApiError::Transport(format!("invalid subdomain {:?}: {}", self.subdomain, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Token token={}", self.api_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(EXTENSION_VERSION), HeaderValue::from_str(&self.version)?);
        Ok(headers)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest {
            method,
            url: self.url(path, query)?,
            headers: self.headers()?,
            body,
        };

        log::debug!("{} {}", request.method, request.url);
        let response = self.transport.send(request).await?;
        check_status(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, query, None).await?;
        parse(&response)
    }
}

fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Map HTTP status codes onto the error kinds the popup distinguishes
fn check_status(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    match response.status {
        status if status.is_success() => Ok(response),
        status if status == StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        status if status == StatusCode::UPGRADE_REQUIRED => Err(ApiError::UpgradeRequired),
        status if status == StatusCode::UNPROCESSABLE_ENTITY => Err(ApiError::ValidationFailed(
            serde_json::from_str::<FormErrors>(&response.body).unwrap_or_default(),
        )),
        status => Err(ApiError::Unknown {
            status: status.as_u16(),
            message: response.body,
        }),
    }
}

#[async_trait(?Send)]
impl ApiClient for MocoClient {
    async fn activities_status(&self, service: Option<&Service>) -> Result<ActivitiesStatus, ApiError> {
        let mut body = json!({ "date": format_date(self.today) });
        if let Some(service) = service {
            body["remote_service"] = json!(service.name);
            body["remote_id"] = json!(service.id);
        }
        let response = self.execute(Method::POST, "activities/status", &[], Some(body)).await?;
        parse(&response)
    }

    async fn create_activity(&self, activity: &Activity) -> Result<(), ApiError> {
        let body = json!({ "activity": activity });
        self.execute(Method::POST, "activities", &[], Some(body)).await?;
        Ok(())
    }

    async fn stop_timer(&self, timed_activity: &TimedActivity) -> Result<(), ApiError> {
        let path = format!("activities/{}/stop_timer", timed_activity.id);
        self.execute(Method::PATCH, &path, &[], None).await?;
        Ok(())
    }

    async fn projects(&self) -> Result<ProjectsResponse, ApiError> {
        self.fetch("projects", &[]).await
    }

    async fn activities(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RecordedActivity>, ApiError> {
        let range = format!("{}:{}", format_date(from), format_date(to));
        self.fetch("activities", &[("date", range)]).await
    }

    async fn schedules(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Schedule>, ApiError> {
        self.fetch("schedules", &[("from", format_date(from)), ("to", format_date(to))])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use futures::executor::block_on;

    fn client(transport: Rc<FakeTransport>) -> MocoClient {
        let mut settings = Settings::new("secret", "acme");
        settings.version = "1.2.3".to_string();
        MocoClient::new(&settings, transport, NaiveDate::from_ymd_opt(2024, 10, 28).unwrap())
    }

    #[test]
    fn test_status_request() {
        let transport = FakeTransport::responding(200, r#"{"seconds": 600, "timed_activity": null}"#);
        let service = Service {
            id: "PROJ-1".to_string(),
            name: "jira".to_string(),
            ..Service::default()
        };

        let status = block_on(client(transport.clone()).activities_status(Some(&service))).unwrap();

        assert_eq!(status.seconds, 600);
        let requests = transport.requests.borrow();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].url.as_str(),
            "https://acme.mocoapp.com/api/browser_extensions/activities/status"
        );
        assert_eq!(requests[0].headers[AUTHORIZATION], "Token token=secret");
        assert_eq!(requests[0].headers[EXTENSION_VERSION], "1.2.3");
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["date"], "2024-10-28");
        assert_eq!(body["remote_id"], "PROJ-1");
    }

    #[test]
    fn test_activities_query() {
        let transport = FakeTransport::responding(200, "[]");
        let from = NaiveDate::from_ymd_opt(2024, 10, 28).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();

        let activities = block_on(client(transport.clone()).activities(from, to)).unwrap();

        assert!(activities.is_empty());
        assert_eq!(
            transport.requests.borrow()[0].url.as_str(),
            "https://acme.mocoapp.com/api/browser_extensions/activities?date=2024-10-28%3A2024-11-03"
        );
    }

    #[test]
    fn test_stop_timer_path() {
        let transport = FakeTransport::responding(200, "");
        let timer = TimedActivity {
            id: 77,
            ..TimedActivity::default()
        };

        block_on(client(transport.clone()).stop_timer(&timer)).unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].method, Method::PATCH);
        assert!(requests[0].url.path().ends_with("/activities/77/stop_timer"));
        assert!(requests[0].body.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let transport = FakeTransport::responding(422, r#"{"hours": ["is invalid"]}"#);

        let err = block_on(client(transport).create_activity(&Activity::default())).unwrap_err();

        match err {
            ApiError::ValidationFailed(errors) => assert_eq!(errors["hours"], vec!["is invalid".to_string()]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_status_mapping() {
        let unauthorized = block_on(client(FakeTransport::responding(401, "")).projects()).unwrap_err();
        let upgrade = block_on(client(FakeTransport::responding(426, "")).projects()).unwrap_err();
        let unknown = block_on(client(FakeTransport::responding(500, "boom")).projects()).unwrap_err();

        assert_eq!(unauthorized, ApiError::Unauthorized);
        assert_eq!(upgrade, ApiError::UpgradeRequired);
        assert_eq!(
            unknown,
            ApiError::Unknown {
                status: 500,
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_transport_failure() {
        let transport = FakeTransport::failing();

        let err = block_on(client(transport).projects()).unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn test_invalid_api_key_is_not_sent() {
        let transport = FakeTransport::responding(200, "[]");
        let settings = Settings::new("bad\nkey", "acme");
        let client = MocoClient::new(&settings, transport.clone(), NaiveDate::from_ymd_opt(2024, 10, 28).unwrap());

        let err = block_on(client.projects()).unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert!(transport.requests.borrow().is_empty());
    }
}
