use super::CollectorError;
use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use std::collections::HashMap;

pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub service: String,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    #[must_use]
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(SHORT_ID_LEN)]
    }

    /// Best-effort self-detection: inside a container the default hostname
    /// is the short container id, so a hostname that prefixes our id means
    /// we are looking at ourselves. Advisory only; a non-containerized
    /// process has a hostname that matches nothing and skips nothing.
    #[must_use]
    pub fn is_host_process(&self, hostname: &str) -> bool {
        !hostname.is_empty() && self.id.starts_with(hostname)
    }
}

/// List currently running containers.
pub async fn list_running(docker: &Docker) -> Result<Vec<ContainerInfo>, CollectorError> {
    let options = ListContainersOptions::<String> {
        all: false,
        ..Default::default()
    };
    let containers = docker.list_containers(Some(options)).await?;
    Ok(containers.into_iter().filter_map(container_to_info).collect())
}

fn container_to_info(container: ContainerSummary) -> Option<ContainerInfo> {
    let id = container.id?;
    let labels = container.labels.unwrap_or_default();
    let name = container
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.strip_prefix('/').unwrap_or(name).to_string())
        .unwrap_or_default();
    let service = resolve_service_name(&id, &name, &labels);
    Some(ContainerInfo {
        id,
        name,
        service,
        labels,
    })
}

/// Service name resolution, in order: the Docker Compose service label, the
/// container name, the short container id.
fn resolve_service_name(id: &str, name: &str, labels: &HashMap<String, String>) -> String {
    if let Some(service) = labels.get(COMPOSE_SERVICE_LABEL) {
        if !service.is_empty() {
            return service.clone();
        }
    }
    if !name.is_empty() {
        return name.to_string();
    }
    id[..id.len().min(SHORT_ID_LEN)].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> ContainerInfo {
        ContainerInfo {
            id: id.to_string(),
            name: String::new(),
            service: String::new(),
            labels: HashMap::new(),
        }
    }

    #[test]
    fn test_service_name_prefers_compose_label() {
        let labels = HashMap::from([(COMPOSE_SERVICE_LABEL.to_string(), "dispatcher".to_string())]);
        assert_eq!(resolve_service_name("abc", "project-dispatcher-1", &labels), "dispatcher");
    }

    #[test]
    fn test_service_name_falls_back_to_name_then_short_id() {
        let labels = HashMap::from([(COMPOSE_SERVICE_LABEL.to_string(), String::new())]);
        assert_eq!(resolve_service_name("abc", "my-container", &labels), "my-container");
        assert_eq!(
            resolve_service_name("0123456789abcdef0123", "", &HashMap::new()),
            "0123456789ab"
        );
    }

    #[test]
    fn test_self_detection_by_hostname_prefix() {
        let container = info("0123456789abcdef0123456789abcdef");
        assert!(container.is_host_process("0123456789ab"));
        assert!(!container.is_host_process("fedcba987654"));
        assert!(!container.is_host_process(""));
    }

    #[test]
    fn test_short_id_of_short_identifier() {
        assert_eq!(info("abc").short_id(), "abc");
    }
}
