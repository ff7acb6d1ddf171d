use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

/// Substituted when a run completes without any usable output part.
pub const NO_RESPONSE_FALLBACK: &str = "No response from agent.";

#[derive(Serialize)]
struct MessagePart {
    content: String,
    content_type: String,
}

#[derive(Serialize)]
struct InputMessage {
    role: String,
    parts: Vec<MessagePart>,
}

#[derive(Serialize)]
struct RunRequest {
    agent_name: String,
    input: Vec<InputMessage>,
}

#[derive(Deserialize)]
struct RunResponse {
    #[serde(default)]
    output: Vec<OutputMessage>,
}

#[derive(Deserialize)]
struct OutputMessage {
    #[serde(default)]
    parts: Vec<OutputPart>,
}

#[derive(Deserialize)]
struct OutputPart {
    content: Option<String>,
}

#[derive(Deserialize)]
struct AgentManifest {
    name: String,
}

#[derive(Deserialize)]
struct AgentsResponse {
    agents: Vec<AgentManifest>,
}

/// Client for the two ACP endpoints: agent discovery and run invocation.
#[derive(Clone)]
pub struct AcpClient {
    client: Client,
    base_url: String,
}

impl AcpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// List the names of the agents registered on the server, in server order.
    pub async fn list_agents(&self) -> Result<Vec<String>> {
        let url = format!("{}/agents", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "agent discovery failed with status: {}",
                response.status()
            ));
        }

        let agents: AgentsResponse = response.json().await?;
        Ok(agents.agents.into_iter().map(|a| a.name).collect())
    }

    /// Send one user message to the named agent and return its reply.
    ///
    /// The reply is the first output message's first part. Servers may answer
    /// with no output at all (the Do-Nothing agent does), in which case the
    /// fixed fallback text stands in.
    pub async fn run(&self, agent_name: &str, text: &str) -> Result<String> {
        let url = format!("{}/runs", self.base_url);

        let request = RunRequest {
            agent_name: agent_name.to_string(),
            input: vec![InputMessage {
                role: "user".to_string(),
                parts: vec![MessagePart {
                    content: text.to_string(),
                    content_type: "text/plain".to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "run request failed with status: {}",
                response.status()
            ));
        }

        let run: RunResponse = response.json().await?;
        let reply = run
            .output
            .first()
            .and_then(|m| m.parts.first())
            .and_then(|p| p.content.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string());

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_agents_extracts_names_in_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agents": [
                    { "name": "Echo_Agent", "description": "Echoes everything" },
                    { "name": "Do_Nothing_Agent", "description": "This agent does nothing" },
                ]
            })))
            .mount(&server)
            .await;

        let client = AcpClient::new(&server.uri());
        let agents = client.list_agents().await.unwrap();
        assert_eq!(agents, vec!["Echo_Agent", "Do_Nothing_Agent"]);
    }

    #[tokio::test]
    async fn list_agents_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = AcpClient::new(&server.uri());
        let err = client.list_agents().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn run_posts_the_wire_payload_and_extracts_the_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runs"))
            .and(body_json(json!({
                "agent_name": "Echo_Agent",
                "input": [{
                    "role": "user",
                    "parts": [{ "content": "hello", "content_type": "text/plain" }]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [{ "parts": [{ "content": "hi" }] }]
            })))
            .mount(&server)
            .await;

        let client = AcpClient::new(&server.uri());
        let reply = client.run("Echo_Agent", "hello").await.unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn run_falls_back_when_output_is_empty_or_missing() {
        for body in [
            json!({}),
            json!({ "output": [] }),
            json!({ "output": [{ "parts": [] }] }),
            json!({ "output": [{ "parts": [{ "content": "" }] }] }),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/runs"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let client = AcpClient::new(&server.uri());
            let reply = client.run("Do_Nothing_Agent", "hello").await.unwrap();
            assert_eq!(reply, NO_RESPONSE_FALLBACK);
        }
    }

    #[tokio::test]
    async fn run_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AcpClient::new(&server.uri());
        let err = client.run("Echo_Agent", "hello").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": [] })))
            .mount(&server)
            .await;

        let client = AcpClient::new(&format!("{}/", server.uri()));
        let agents = client.list_agents().await.unwrap();
        assert!(agents.is_empty());
    }
}
