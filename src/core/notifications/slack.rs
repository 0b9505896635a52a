use super::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::core::events::JobEvent;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, event: &JobEvent) -> serde_json::Value {
        match event {
            JobEvent::Started { backup_id, name } => {
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Backup Started",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Backup:*\n{}", name)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*ID:*\n`{}`", backup_id)
                                }
                            ]
                        }
                    ]
                })
            }
            JobEvent::Completed {
                backup_id,
                name,
                warnings,
                duration,
                target_size,
            } => {
                let header = if *warnings {
                    "Backup Complete (with warnings)"
                } else {
                    "Backup Complete"
                };
                let duration_text = duration
                    .map(|d| format!("{}s", d.as_secs()))
                    .unwrap_or_else(|| "-".to_string());
                let size_text = target_size
                    .map(|b| format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)))
                    .unwrap_or_else(|| "-".to_string());
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": header,
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Backup:*\n{}", name)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*ID:*\n`{}`", backup_id)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Stored:*\n{}", size_text)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Duration:*\n{}", duration_text)
                                }
                            ]
                        }
                    ]
                })
            }
            JobEvent::Failed {
                backup_id,
                name,
                error,
            } => {
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Backup Failed",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Backup:*\n{}", name)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*ID:*\n`{}`", backup_id)
                                }
                            ]
                        },
                        {
                            "type": "section",
                            "text": {
                                "type": "mrkdwn",
                                "text": format!("*Error:*\n```{}```", error)
                            }
                        }
                    ]
                })
            }
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: &JobEvent) -> Result<()> {
        let payload = self.format_message(event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;
        Ok(())
    }
}
