//! Transactional email templates.
//!
//! Each message the application sends is one of the [`Template`] variants,
//! carrying just the pieces of information the message needs.

use crate::Config;

/// Links embedded in the messages.
#[derive(Clone, Debug)]
pub struct Links {
    pub app_url: String,
    pub substack_url: String,
}

impl From<&Config> for Links {
    fn from(config: &Config) -> Self {
        Self {
            app_url: config.app_url.trim_end_matches('/').to_string(),
            substack_url: config.email.substack_url.clone(),
        }
    }
}

impl Links {
    fn downloads(&self) -> String {
        format!("{}/dashboard/downloads", self.app_url)
    }

    fn apply(&self) -> String {
        format!("{}/collective/apply", self.app_url)
    }

    fn portal(&self) -> String {
        format!("{}/collective/portal", self.app_url)
    }

    fn freebie(&self, email: &str) -> String {
        let email: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        format!("{}/api/freebie/download?email={}", self.app_url, email)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Template {
    GuidePurchase {
        first_name: String,
    },
    PlannerPurchase {
        first_name: String,
    },
    /// Sent to the buyer of a gift order
    BogoBuyer {
        first_name: String,
        recipient_first_name: String,
    },
    /// Sent to the person receiving the gift
    BogoRecipient {
        first_name: String,
        buyer_first_name: String,
    },
    CollectiveWelcome {
        first_name: String,
        /// Personal note appended to the standard message
        message: Option<String>,
    },
    CollectiveDenied {
        first_name: String,
        /// Replaces the standard message when provided
        message: Option<String>,
    },
    Freebie {
        first_name: String,
        email: String,
    },
}

/// Fully rendered message contents.
#[derive(Clone, Debug)]
pub struct Rendered {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

const DEFAULT_DENIAL: &str = "Thank you for sharing your story with us in your application \
    for The Collective. Right now the cohort is focused on artists at a very specific stage \
    of their recording and touring journey, and we don't think it's the right fit for you \
    just yet. This isn't a \"no\", it's a \"not right now\".";

impl Template {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn render(&self, links: &Links) -> Rendered {
        let (subject, paragraphs) = match self {
            Template::GuidePurchase { first_name } => (
                "You're in. (And your nervous system says thank you.)".to_string(),
                vec![
                    greeting(first_name),
                    "Your copy of The Mindful Musicpreneur Guide and your bonus Mindful Muse \
                     Quarterly Planner are ready for you."
                        .to_string(),
                    format!("Download your Guide + Planner: {}", links.downloads()),
                    format!(
                        "When you're ready to do this work together with others, apply for \
                         The Collective: {}",
                        links.apply()
                    ),
                    format!("Join the conversation on Substack: {}", links.substack_url),
                ],
            ),
            Template::PlannerPurchase { first_name } => (
                "Your schedule is about to get a lot more soulful.".to_string(),
                vec![
                    greeting(first_name),
                    "You've got the Mindful Muse Quarterly Planner.".to_string(),
                    format!("Download your Planner: {}", links.downloads()),
                    "Want the full system? You can upgrade to The Mindful Musicpreneur Guide \
                     anytime."
                        .to_string(),
                    format!("Looking for your people? Apply to The Collective: {}", links.apply()),
                ],
            ),
            Template::BogoBuyer {
                first_name,
                recipient_first_name,
            } => (
                "Double the magic. (Your BOGO details inside)".to_string(),
                vec![
                    greeting(first_name),
                    "Not only did you invest in yourself, you're pulling another artist up \
                     with you."
                        .to_string(),
                    format!("Your access: {}", links.downloads()),
                    format!(
                        "We've sent an email to {recipient_first_name} with their download \
                         link and a note that it's a gift from you."
                    ),
                    format!("Both of you are eligible to apply for The Collective: {}", links.apply()),
                ],
            ),
            Template::BogoRecipient {
                first_name,
                buyer_first_name,
            } => (
                format!("A gift for your career (from {buyer_first_name})"),
                vec![
                    greeting(first_name),
                    format!(
                        "Surprise! {buyer_first_name} wanted you to have a copy of The Mindful \
                         Musicpreneur Guide."
                    ),
                    format!("Grab your Guide + bonus Planner here: {}", links.downloads()),
                    format!(
                        "You're also invited to apply for our private community, The \
                         Collective: {}",
                        links.apply()
                    ),
                ],
            ),
            Template::CollectiveWelcome {
                first_name,
                message,
            } => {
                let mut paragraphs = vec![
                    greeting(first_name),
                    "We've reviewed your application and we're thrilled to have your energy \
                     in the room."
                        .to_string(),
                    format!(
                        "Your portal with the link to our next session: {}",
                        links.portal()
                    ),
                    "Your complimentary private Substack membership will be activated within \
                     48 hours."
                        .to_string(),
                ];
                if let Some(message) = message.as_deref().filter(|m| !m.trim().is_empty()) {
                    paragraphs.push(message.to_string());
                }
                (
                    "Welcome to The Collective. (The door is open.)".to_string(),
                    paragraphs,
                )
            }
            Template::CollectiveDenied {
                first_name,
                message,
            } => (
                "Regarding your Collective Application".to_string(),
                vec![
                    greeting(first_name),
                    message
                        .as_deref()
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or(DEFAULT_DENIAL)
                        .to_string(),
                    "Please keep doing the work in the Guide and the Planner.".to_string(),
                    format!("In the meantime, see you on Substack: {}", links.substack_url),
                ],
            ),
            Template::Freebie { first_name, email } => (
                "Your Freebie is Ready!".to_string(),
                vec![
                    greeting(first_name),
                    "Thanks for joining The Mindful Musicpreneur community! Your free resource \
                     is ready for download."
                        .to_string(),
                    format!("Download now: {}", links.freebie(email)),
                ],
            ),
        };

        let html = paragraphs
            .iter()
            .map(|p| format!("<p>{}</p>", escape_html(p)))
            .collect::<Vec<_>>()
            .join("\n");
        Rendered {
            subject,
            plain: paragraphs.join("\n\n"),
            html,
        }
    }
}

fn greeting(first_name: &str) -> String {
    if first_name.trim().is_empty() {
        "Hi there,".to_string()
    } else {
        format!("Hi {},", first_name.trim())
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
