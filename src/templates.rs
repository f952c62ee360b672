//! Message templates for each stage of the exercise.
//!
//! Pure functions: same input, same (subject, body); no I/O.

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// First contact.
pub fn initial() -> EmailTemplate {
    EmailTemplate::new(
        "Action required: unrecognized sign-in on your account",
        "Hello,\n\n\
         We detected a sign-in to your account from a device we do not recognize.\n\
         If this was not you, please reply to this message so we can look into it.\n\n\
         Regards,\n\
         IT Service Desk",
    )
}

/// Reminder for a target that has not replied. `retry_count` is the number of
/// this reminder, starting at 1.
pub fn reminder(retry_count: u32) -> EmailTemplate {
    match retry_count {
        0 | 1 => EmailTemplate::new(
            "Reminder: please confirm the recent sign-in",
            "Hello,\n\n\
             We have not heard back about the unrecognized sign-in on your account.\n\
             Please reply to confirm whether it was you.\n\n\
             Regards,\n\
             IT Service Desk",
        ),
        2 => EmailTemplate::new(
            "Second reminder: account review pending",
            "Hello,\n\n\
             Your account is still flagged for review after an unrecognized sign-in.\n\
             Please reply today so the review can be closed.\n\n\
             Regards,\n\
             IT Service Desk",
        ),
        n => EmailTemplate::new(
            format!("Final notice ({n}): account review will be escalated"),
            "Hello,\n\n\
             This is the final reminder about the unrecognized sign-in on your account.\n\
             Without a reply the review will be escalated to your manager.\n\n\
             Regards,\n\
             IT Service Desk",
        ),
    }
}

/// Follow-up for a worried or curious reply.
///
/// The link paragraph is included only when `capture_link` is set and
/// non-blank; an empty URL is never rendered.
pub fn worried_followup(capture_link: Option<&str>) -> EmailTemplate {
    let mut body = String::from(
        "Hello,\n\n\
         Thank you for getting back to us. We understand this may be concerning.\n",
    );
    if let Some(link) = capture_link.map(str::trim).filter(|l| !l.is_empty()) {
        body.push_str(&format!(
            "\nPlease review the sign-in details and confirm your account here:\n{link}\n"
        ));
    } else {
        body.push_str("\nA member of the team will contact you with the sign-in details.\n");
    }
    body.push_str("\nRegards,\nIT Service Desk");
    EmailTemplate::new("Re: Action required: next steps for your account", body)
}

/// Follow-up for an unbothered or dismissive reply.
pub fn dismissive_followup() -> EmailTemplate {
    EmailTemplate::new(
        "Re: Action required: account access may be restricted",
        "Hello,\n\n\
         Thanks for your reply. Please note that unconfirmed sign-ins are treated as\n\
         a security risk and access may be restricted until the review is complete.\n\n\
         Regards,\n\
         IT Service Desk",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_deterministic() {
        assert_eq!(initial(), initial());
        assert_eq!(reminder(2), reminder(2));
        assert_eq!(worried_followup(Some("https://a")), worried_followup(Some("https://a")));
        assert_eq!(dismissive_followup(), dismissive_followup());
    }

    #[test]
    fn reminders_escalate() {
        let subjects: Vec<String> = (1..=3).map(|n| reminder(n).subject).collect();
        assert!(subjects[0].starts_with("Reminder"));
        assert!(subjects[1].starts_with("Second reminder"));
        assert!(subjects[2].starts_with("Final notice"));
        assert_ne!(subjects[0], subjects[1]);
        assert_ne!(subjects[1], subjects[2]);
    }

    #[test]
    fn worried_followup_embeds_link() {
        let t = worried_followup(Some("https://training.example.com/landing"));
        assert!(t.body.contains("https://training.example.com/landing"));
    }

    #[test]
    fn worried_followup_omits_missing_or_blank_link() {
        for link in [None, Some(""), Some("   ")] {
            let t = worried_followup(link);
            assert!(!t.body.contains("confirm your account here"));
            assert!(!t.body.contains("http"));
            assert!(t.body.contains("will contact you"));
        }
    }

    #[test]
    fn no_template_is_empty() {
        for t in [initial(), reminder(1), worried_followup(None), dismissive_followup()] {
            assert!(!t.subject.is_empty());
            assert!(!t.body.is_empty());
        }
    }
}
