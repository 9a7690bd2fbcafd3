use core::{
    fmt,
    mem,
};

use ku::{
    error::Result,
    memory::{
        Block,
        USER_RW,
        USER_RX,
        Virt,
    },
    process::MiniContext,
};

use crate::memory::AddressSpace;

// Used in docs.
#[allow(unused)]
use ku::error::Error;

/// Периодический будильник процесса.
///
/// Считает тики таймера, которые процесс провёл в режиме пользователя,
/// и каждые `period` тиков переключает его на обработчик `handler`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Alarm {
    /// Число тиков между срабатываниями, ноль выключает будильник.
    period: u64,

    /// Тики с последнего срабатывания или с момента взвода будильника.
    elapsed: u64,

    /// Пользовательская функция, которая получает сигнал будильника.
    handler: Virt,
}

impl Alarm {
    /// Взводит будильник: `handler` будет вызываться каждые `period` тиков,
    /// считая с текущего момента.
    /// Нулевой `period` выключает будильник.
    pub fn arm(
        &mut self,
        period: u64,
        handler: Virt,
    ) {
        self.period = period;
        self.handler = handler;
        self.elapsed = 0;
    }

    /// Выключает будильник.
    pub fn disarm(&mut self) {
        self.arm(0, Virt::zero());
    }

    /// Возвращает `true`, если будильник взведён.
    pub fn is_armed(&self) -> bool {
        self.period != 0
    }

    /// Число тиков между срабатываниями.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Тики с последнего срабатывания.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Пользовательская функция, которая получает сигнал будильника.
    pub fn handler(&self) -> Virt {
        self.handler
    }

    /// Учитывает тик таймера, пришедший в режиме пользователя.
    ///
    /// Если период истёк, возвращает [`Redirect`],
    /// который нужно применить к прерванному контексту.
    pub fn tick(&mut self) -> Option<Redirect> {
        self.elapsed = self.elapsed.saturating_add(1);

        if self.is_armed() && self.elapsed >= self.period {
            self.elapsed = 0;
            Some(Redirect {
                handler: self.handler,
            })
        } else {
            None
        }
    }

    /// Учитывает сразу `ticks` тиков таймера, например отложенных.
    /// Даже если за это время период истёк несколько раз,
    /// возвращает не больше одного [`Redirect`].
    pub fn advance(
        &mut self,
        ticks: u64,
    ) -> Option<Redirect> {
        (0 .. ticks).fold(None, |redirect, _| self.tick().or(redirect))
    }
}

impl fmt::Display for Alarm {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(
            formatter,
            "{{ period: {}, elapsed: {}, handler: {} }}",
            self.period, self.elapsed, self.handler,
        )
    }
}

/// Переключение прерванного пользовательского контекста на обработчик будильника.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Redirect {
    /// Пользовательская функция, которая получает сигнал будильника.
    handler: Virt,
}

impl Redirect {
    /// Пользовательская функция, которая получает сигнал будильника.
    pub fn handler(&self) -> Virt {
        self.handler
    }

    /// Переписывает `context` так, как будто он сам вызвал обработчик:
    /// кладёт прерванный `rip` на стек пользователя и передаёт управление обработчику.
    /// Инструкция `ret` в обработчике продолжит прерванный код с исходным `rsp`.
    ///
    /// Если задан `check_handler`, обработчик должен лежать в исполнимой странице пользователя,
    /// а ячейка стека --- в доступной пользователю на запись.
    /// Иначе возвращается ошибка [`Error::NoPage`] или [`Error::PermissionDenied`].
    /// При любой ошибке `context` остаётся нетронутым.
    pub fn apply<A: AddressSpace + ?Sized>(
        &self,
        context: &mut MiniContext,
        address_space: &mut A,
        check_handler: bool,
    ) -> Result<()> {
        let mut redirected = *context;
        let slot = redirected.push::<Virt>()?;

        if check_handler {
            address_space.check_permission(Block::from_size(self.handler, 1)?, USER_RX)?;
            address_space.check_permission(slot, USER_RW)?;
        }

        debug_assert_eq!(slot.size(), mem::size_of::<usize>());
        address_space.write_word(slot.start_address(), context.rip().into_usize())?;

        *context = MiniContext::new(self.handler, redirected.rsp());

        Ok(())
    }
}
