//! Background work dispatched off the request path.
//!
//! Handlers push [`Task`]s onto an unbounded channel through a cloneable
//! [`TaskQueue`]; a single worker spawned at startup drains it.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{configuration::TaskSettings, domain::user_email::UserEmail, email_client::{EmailClient, OrderConfirmation}};

#[derive(Debug, Clone)]
pub enum Task{
    SendOrderConfirmation{
        order_id: Uuid,
        recipient: UserEmail,
        username: String,
        total_price: Decimal
    }
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Task::SendOrderConfirmation{ .. } => "send_order_confirmation"
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue{
    sender: mpsc::UnboundedSender<Task>
}

impl TaskQueue {
    /// Spawns the worker on the current runtime. The worker stops once every
    /// `TaskQueue` clone has been dropped and the backlog is drained.
    pub fn start(email_client: EmailClient, settings: &TaskSettings) -> (TaskQueue, JoinHandle<()>){
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = TaskWorker{
            email_client,
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms)
        };

        let handle = tokio::spawn(worker.run(receiver));

        (TaskQueue{ sender }, handle)
    }

    #[tracing::instrument("Dispatching background task", skip(self), fields(task = task.name()))]
    pub fn dispatch(&self, task: Task){
        if let Err(e) = self.sender.send(task) {
            tracing::error!("Task worker is gone, dropping {}", e.0.name());
        }
    }
}

struct TaskWorker{
    email_client: EmailClient,
    max_retries: u32,
    retry_delay: Duration
}

impl TaskWorker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Task>){
        while let Some(task) = receiver.recv().await {
            self.run_with_retries(&task).await;
        }

        tracing::info!("Task queue closed, worker exiting");
    }

    #[tracing::instrument("Running background task", skip(self, task), fields(task = task.name()))]
    async fn run_with_retries(&self, task: &Task){
        let mut attempt = 0;

        loop {
            match self.execute(task).await {
                Ok(()) => return,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "Task failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                },
                Err(e) => {
                    tracing::error!(error = %e, "Task failed, giving up");
                    return
                }
            }
        }
    }

    async fn execute(&self, task: &Task) -> Result<(), reqwest::Error>{
        match task {
            Task::SendOrderConfirmation{ order_id, recipient, username, total_price } => {
                let confirmation = OrderConfirmation{
                    order_id: *order_id,
                    username,
                    total_price: *total_price
                };

                self.email_client.send_order_confirmation(recipient, &confirmation).await
            }
        }
    }
}
