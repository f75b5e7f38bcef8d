//! Monthly bill reminders.
//!
//! The check runs daily and only acts on the last local day of a month. Each
//! (home, user) pair with a positive monthly cost gets one reminder; reruns
//! are absorbed by the notification dedupe key.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::periods::{end_of_month, is_last_day_of_month, month_label};
use crate::repositories::notifications::{NewNotification, NotificationChannel, NotificationStatus};
use crate::repositories::profiles::Profile;
use crate::repositories::summaries::EnergySummary;
use crate::repositories::{HomeStore, NotificationStore, ProfileStore, SummaryStore};
use crate::services::emitter::NotificationEmitter;

/// Counters of one `run_daily_check` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingRunReport {
    pub skipped_not_last_day: bool,
    /// Billable monthly summaries found for the month.
    pub summaries: usize,
    /// (home, user) pairs those summaries belong to.
    pub examined: usize,
    pub created: usize,
    pub duplicates: usize,
    pub skipped_missing_profile: usize,
    pub failed: usize,
    /// Created, but the emitter could not deliver them.
    pub delivery_failed: usize,
}

/// Monthly totals of one home for one user, summed over its summaries.
#[derive(Debug, Clone, PartialEq)]
struct BillingGroup {
    home_id: i64,
    user_id: String,
    period_end: DateTime<Utc>,
    total_energy_kwh: f64,
    total_cost: f64,
}

fn group_summaries(summaries: &[EnergySummary]) -> Vec<BillingGroup> {
    let mut groups: BTreeMap<(i64, String), BillingGroup> = BTreeMap::new();
    for summary in summaries {
        let group = groups
            .entry((summary.home_id, summary.user_id.clone()))
            .or_insert_with(|| BillingGroup {
                home_id: summary.home_id,
                user_id: summary.user_id.clone(),
                period_end: summary.period_end,
                total_energy_kwh: 0.0,
                total_cost: 0.0,
            });
        group.total_energy_kwh += summary.total_energy_kwh;
        group.total_cost += summary.total_cost;
    }
    groups.into_values().collect()
}

/// Email and in-app follow the profile; the reminder marker is always set.
pub fn build_channels(profile: &Profile) -> Vec<NotificationChannel> {
    let mut channels = Vec::with_capacity(3);
    if profile.email_notifications {
        channels.push(NotificationChannel::Email);
    }
    if profile.in_app_notifications {
        channels.push(NotificationChannel::InApp);
    }
    channels.push(NotificationChannel::BillReminder);
    channels
}

pub fn reminder_dedupe_key(user_id: &str, home_id: i64, due_date: DateTime<Utc>) -> String {
    format!(
        "bill_reminder:{}:{}:{}",
        user_id,
        home_id,
        due_date.timestamp_millis()
    )
}

pub fn reminder_message(
    home_name: &str,
    month: &str,
    total_energy_kwh: f64,
    total_cost: f64,
    due_date: DateTime<Utc>,
    offset: FixedOffset,
) -> String {
    format!(
        "Your energy bill for {} for {} is ready: {:.2} kWh used, total cost {:.2}. Payment is due by {}.",
        home_name,
        month,
        total_energy_kwh,
        total_cost,
        due_date.with_timezone(&offset).format("%B %-d, %Y")
    )
}

enum Outcome {
    Created { delivered: bool },
    Duplicate,
    MissingProfile,
}

pub struct BillingReminderJob {
    summaries: Arc<dyn SummaryStore>,
    profiles: Arc<dyn ProfileStore>,
    homes: Arc<dyn HomeStore>,
    notifications: Arc<dyn NotificationStore>,
    emitter: Arc<dyn NotificationEmitter>,
    due_days: i64,
    offset: FixedOffset,
}

impl BillingReminderJob {
    pub fn new(
        summaries: Arc<dyn SummaryStore>,
        profiles: Arc<dyn ProfileStore>,
        homes: Arc<dyn HomeStore>,
        notifications: Arc<dyn NotificationStore>,
        emitter: Arc<dyn NotificationEmitter>,
        due_days: i64,
        offset: FixedOffset,
    ) -> Self {
        Self {
            summaries,
            profiles,
            homes,
            notifications,
            emitter,
            due_days,
            offset,
        }
    }

    /// Create the reminders for the month ending today, if today is its last day.
    ///
    /// Only loading the summaries can fail the run. Errors for a single
    /// (home, user) pair are logged and counted.
    pub async fn run_daily_check(&self, now: DateTime<Utc>) -> Result<BillingRunReport> {
        let mut report = BillingRunReport::default();

        if !is_last_day_of_month(now, self.offset) {
            tracing::debug!(%now, "not the last day of the month, skipping bill reminders");
            report.skipped_not_last_day = true;
            return Ok(report);
        }

        let period_end = end_of_month(now, self.offset);
        let summaries = self.summaries.find_billable_monthly(period_end).await?;
        let groups = group_summaries(&summaries);
        report.summaries = summaries.len();
        report.examined = groups.len();

        tracing::info!(
            %period_end,
            summaries = summaries.len(),
            homes = groups.len(),
            "running bill reminder check"
        );

        for group in &groups {
            match self.remind(group).await {
                Ok(Outcome::Created { delivered }) => {
                    report.created += 1;
                    if !delivered {
                        report.delivery_failed += 1;
                    }
                }
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Ok(Outcome::MissingProfile) => report.skipped_missing_profile += 1,
                Err(e) => {
                    tracing::error!(
                        home_id = group.home_id,
                        user_id = %group.user_id,
                        error = %e,
                        "failed to create bill reminder"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(?report, "bill reminder check finished");
        Ok(report)
    }

    async fn remind(&self, group: &BillingGroup) -> Result<Outcome> {
        let Some(profile) = self.profiles.get(&group.user_id).await? else {
            tracing::warn!(
                home_id = group.home_id,
                user_id = %group.user_id,
                "no profile for user, skipping bill reminder"
            );
            return Ok(Outcome::MissingProfile);
        };

        let home = self
            .homes
            .get_home(group.home_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Home {} not found", group.home_id)))?;

        let due_date = group.period_end + Duration::days(self.due_days);
        let message = reminder_message(
            &home.name,
            &month_label(group.period_end, self.offset),
            group.total_energy_kwh,
            group.total_cost,
            due_date,
            self.offset,
        );

        let inserted = self
            .notifications
            .insert_if_absent(&NewNotification {
                user_id: group.user_id.clone(),
                home_id: Some(group.home_id),
                anomaly_alert_id: None,
                channels: build_channels(&profile),
                message,
                due_date: Some(due_date),
                dedupe_key: Some(reminder_dedupe_key(&group.user_id, group.home_id, due_date)),
            })
            .await?;

        let Some(notification) = inserted else {
            tracing::debug!(
                home_id = group.home_id,
                user_id = %group.user_id,
                "bill reminder already exists"
            );
            return Ok(Outcome::Duplicate);
        };

        tracing::info!(
            notification_id = notification.id,
            home_id = group.home_id,
            user_id = %group.user_id,
            total_cost = group.total_cost,
            "bill reminder created"
        );

        if let Err(e) = self.emitter.emit(&notification).await {
            tracing::warn!(
                notification_id = notification.id,
                error = %e,
                "bill reminder delivery failed"
            );
            if let Err(e) = self
                .notifications
                .set_status(notification.id, NotificationStatus::Failed, None)
                .await
            {
                tracing::error!(
                    notification_id = notification.id,
                    error = %e,
                    "failed to mark notification as failed"
                );
            }
            return Ok(Outcome::Created { delivered: false });
        }

        Ok(Outcome::Created { delivered: true })
    }
}
