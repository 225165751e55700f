//! Interrupt line watcher
//!
//! INT_N stays low until the engine reads `REG_INT_FLAGS`, so a falling
//! edge marks each new batch of flags.

use defmt::*;
use vitrine_hal::InputPin;
use vitrine_hal_rp2040::RpInput;

use crate::channels::EVE_IRQ;

#[embassy_executor::task]
pub async fn irq_task(mut int: RpInput<'static>) {
    info!("IRQ task started");

    // flags latched before the task started
    if int.is_low() {
        EVE_IRQ.signal(());
    }

    loop {
        int.wait_for_falling_edge().await;
        EVE_IRQ.signal(());
    }
}
